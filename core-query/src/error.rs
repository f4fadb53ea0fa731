use crate::key::QueryKey;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Error carried by a query.
///
/// Cloneable so every caller sharing one in-flight fetch receives the same
/// failure. The underlying error is kept behind an `Arc` and can be
/// recovered with [`downcast_ref`](Self::downcast_ref).
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    #[error("Query {key} failed after {attempts} attempt(s): {source}")]
    Failed {
        key: QueryKey,
        attempts: u32,
        source: Arc<dyn StdError + Send + Sync + 'static>,
    },

    #[error("Query {key} was cancelled")]
    Cancelled { key: QueryKey },

    #[error("Query {key} data could not be converted: {message}")]
    Serialization { key: QueryKey, message: String },

    /// The task running the fetch panicked or was aborted
    #[error("Query {key} task failed: {message}")]
    Task { key: QueryKey, message: String },
}

impl QueryError {
    pub fn key(&self) -> &QueryKey {
        match self {
            QueryError::Failed { key, .. }
            | QueryError::Cancelled { key }
            | QueryError::Serialization { key, .. }
            | QueryError::Task { key, .. } => key,
        }
    }

    /// Attempts made before giving up; zero when no fetch ran.
    pub fn attempts(&self) -> u32 {
        match self {
            QueryError::Failed { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled { .. })
    }

    /// The error returned by the fetch function, if it is an `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            QueryError::Failed { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub(crate) fn serialization(key: &QueryKey, error: serde_json::Error) -> Self {
        QueryError::Serialization {
            key: key.clone(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, PartialEq)]
    struct NotFound(&'static str);

    impl fmt::Display for NotFound {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Podcast with ID {} not found", self.0)
        }
    }

    impl StdError for NotFound {}

    #[test]
    fn test_downcast_and_message() {
        let err = QueryError::Failed {
            key: QueryKey::podcast_detail("42"),
            attempts: 1,
            source: Arc::new(NotFound("42")),
        };

        assert_eq!(err.downcast_ref::<NotFound>(), Some(&NotFound("42")));
        assert_eq!(err.attempts(), 1);
        assert_eq!(
            err.to_string(),
            "Query podcast/detail/42 failed after 1 attempt(s): Podcast with ID 42 not found"
        );
        assert!(err.clone().source().is_some());
    }

    #[test]
    fn test_cancelled() {
        let err = QueryError::Cancelled {
            key: QueryKey::podcasts(),
        };
        assert!(err.is_cancelled());
        assert_eq!(err.key(), &QueryKey::podcasts());
        assert!(err.downcast_ref::<NotFound>().is_none());
    }
}
