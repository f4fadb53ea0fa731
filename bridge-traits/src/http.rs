//! Catalog HTTP access
//!
//! The core only ever reads JSON documents from the catalog and from the CORS
//! relay, so the contract is a single GET with an optional deadline. Retry and
//! fallback live above this layer; an implementation sends a request exactly
//! once.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// A GET request for one catalog document.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Deadline for the whole exchange, body included.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends catalog requests on behalf of the core.
///
/// Implementations must honor [`HttpRequest::timeout`] and report an expired
/// deadline as [`BridgeError::Timeout`](crate::BridgeError::Timeout). A
/// non-2xx status is not an error here; it comes back as a regular
/// [`HttpResponse`] and the fetcher classifies it.
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn top_podcasts(client: &dyn HttpClient) -> bridge_traits::error::Result<usize> {
///     let request = HttpRequest::get("https://itunes.apple.com/us/rss/toppodcasts/json")
///         .header("Accept", "application/json");
///     Ok(client.execute(request).await?.body.len())
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// # Errors
    ///
    /// Connection failures (DNS, refused, TLS) and expired deadlines.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_accept_header_and_deadline() {
        let request = HttpRequest::get("https://itunes.apple.com/lookup?id=1")
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(10));

        assert_eq!(request.url, "https://itunes.apple.com/lookup?id=1");
        assert_eq!(
            request.headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_only_2xx_is_success() {
        assert!(HttpResponse::new(200, "{}").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(304, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
        assert!(!HttpResponse::new(503, "").is_success());
    }
}
