//! Persisted snapshot of the query cache
//!
//! Stored as one JSON document:
//!
//! ```json
//! {
//!   "timestamp": 1705276800000,
//!   "buster": "0.1.0",
//!   "clientState": {
//!     "queries": [
//!       { "queryKey": ["podcasts"], "data": [...], "dataUpdatedAt": 1705276800000 }
//!     ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// One cached query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedQuery {
    pub query_key: Vec<String>,
    pub data: Value,
    /// Unix millis of the fetch that produced `data`
    pub data_updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DehydratedState {
    #[serde(default)]
    pub queries: Vec<DehydratedQuery>,
}

impl DehydratedState {
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    /// Unix millis when the snapshot was taken
    pub timestamp: i64,
    pub buster: String,
    pub client_state: DehydratedState,
}

/// Why a restored snapshot must not be hydrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    Expired { age_ms: i64 },
    BusterMismatch { stored: String, expected: String },
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::Expired { age_ms } => write!(f, "expired ({}ms old)", age_ms),
            DiscardReason::BusterMismatch { stored, expected } => {
                write!(f, "buster mismatch (stored {:?}, expected {:?})", stored, expected)
            }
        }
    }
}

impl PersistedSnapshot {
    pub fn new(timestamp: i64, buster: impl Into<String>, client_state: DehydratedState) -> Self {
        Self {
            timestamp,
            buster: buster.into(),
            client_state,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp)
    }

    /// Checks that the snapshot is young enough and from the same build.
    ///
    /// A timestamp in the future counts as age zero.
    pub fn check(&self, now_ms: i64, max_age: Duration, buster: &str) -> Result<(), DiscardReason> {
        let age_ms = self.age_ms(now_ms).max(0);
        if age_ms as u128 > max_age.as_millis() {
            return Err(DiscardReason::Expired { age_ms });
        }

        if self.buster != buster {
            return Err(DiscardReason::BusterMismatch {
                stored: self.buster.clone(),
                expected: buster.to_string(),
            });
        }

        Ok(())
    }
}
