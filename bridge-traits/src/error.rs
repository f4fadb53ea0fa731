use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error(
        "Storage quota exceeded while writing '{key}': {requested_bytes} bytes requested, quota is {quota_bytes} bytes"
    )]
    QuotaExceeded {
        key: String,
        requested_bytes: u64,
        quota_bytes: u64,
    },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this error signals a full storage backend.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BridgeError::QuotaExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
