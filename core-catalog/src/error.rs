use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which route a request took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPath {
    Direct,
    Proxy,
}

impl fmt::Display for FetchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPath::Direct => f.write_str("direct"),
            FetchPath::Proxy => f.write_str("proxy"),
        }
    }
}

/// Why a single attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// DNS, connection, TLS or CORS-style transport failure
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("HTTP {status}")]
    Status { status: u16 },

    /// The response body (direct payload or relay envelope) is not JSON
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// The relay answered but its envelope has no `contents`
    #[error("No contents in proxy response")]
    MissingContents,

    /// The relay's `contents` string is not the expected JSON
    #[error("Failed to parse JSON response: {0}")]
    InvalidContents(String),
}

impl FetchFailure {
    /// Failures that only the relay can produce.
    pub fn is_envelope_error(&self) -> bool {
        matches!(
            self,
            FetchFailure::MissingContents | FetchFailure::InvalidContents(_)
        )
    }

    /// The server answered 2xx but the body is not the expected document.
    pub fn is_malformed_payload(&self) -> bool {
        matches!(
            self,
            FetchFailure::InvalidJson(_)
                | FetchFailure::MissingContents
                | FetchFailure::InvalidContents(_)
        )
    }
}

/// Both the direct request and the relay failed.
///
/// The proxy path is the terminal one, so it is what [`path`](Self::path)
/// reports; the direct failure is kept for diagnosis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "API Error (proxy): Both direct and proxy methods failed. Direct: {direct}. Proxy: {proxy} (URL: {url})"
)]
pub struct FetchError {
    pub url: String,
    pub direct: FetchFailure,
    pub proxy: FetchFailure,
}

impl FetchError {
    pub fn path(&self) -> FetchPath {
        FetchPath::Proxy
    }

    /// Every path attempted, in order.
    pub fn failed_paths(&self) -> [FetchPath; 2] {
        [FetchPath::Direct, FetchPath::Proxy]
    }

    pub fn failure(&self, path: FetchPath) -> &FetchFailure {
        match path {
            FetchPath::Direct => &self.direct,
            FetchPath::Proxy => &self.proxy,
        }
    }

    /// Both routes reached a server and both returned an unusable body.
    pub fn is_malformed(&self) -> bool {
        self.direct.is_malformed_payload() && self.proxy.is_malformed_payload()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Podcast with ID {podcast_id} not found")]
    NotFound { podcast_id: String },

    #[error("Podcast info not found for ID {podcast_id}")]
    MissingPodcastInfo { podcast_id: String },

    #[error("Invalid {service} response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl CatalogError {
    /// Transport failures may succeed on another attempt; a missing podcast
    /// or a malformed response will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Fetch(err) => !err.is_malformed(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound { .. } | CatalogError::MissingPodcastInfo { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
