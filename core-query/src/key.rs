//! Query keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hierarchical cache key, e.g. `["podcast", "detail", "1574007634"]`.
///
/// Serialized as a plain string array so persisted snapshots keep the same
/// shape regardless of how keys are built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Top podcasts list.
    pub fn podcasts() -> Self {
        Self::new(["podcasts"])
    }

    /// Detail of one podcast.
    pub fn podcast_detail(podcast_id: &str) -> Self {
        Self::new(["podcast", "detail", podcast_id])
    }

    /// Every detail query.
    pub fn all_podcast_details() -> Self {
        Self::new(["podcast", "detail"])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// True if `prefix` matches the leading parts of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<Vec<String>> for QueryKey {
    fn from(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

impl From<QueryKey> for Vec<String> {
    fn from(key: QueryKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_prefix() {
        let key = QueryKey::podcast_detail("1574007634");
        assert_eq!(key.to_string(), "podcast/detail/1574007634");
        assert!(key.starts_with(&QueryKey::all_podcast_details()));
        assert!(!QueryKey::podcasts().starts_with(&QueryKey::all_podcast_details()));
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&QueryKey::podcasts()).unwrap();
        assert_eq!(json, r#"["podcasts"]"#);
        let key: QueryKey = serde_json::from_str(r#"["podcast","detail","7"]"#).unwrap();
        assert_eq!(key, QueryKey::podcast_detail("7"));
    }
}
