use bridge_traits::BridgeError;
use thiserror::Error;

/// Failures inside the cache layer.
///
/// These never leave [`StoragePersister`](crate::StoragePersister); its
/// public operations log them and degrade to running without a cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupted generation index under {key}: {message}")]
    CorruptedIndex { key: String, message: String },
}

impl CacheError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, CacheError::Storage(e) if e.is_quota_exceeded())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
