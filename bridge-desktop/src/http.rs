//! Catalog HTTP client backed by reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends each request once over a pooled reqwest client.
///
/// An expired deadline becomes [`BridgeError::Timeout`] so the fetcher can
/// move on to the relay.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// `timeout` caps requests that do not set their own.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("podcast-hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("reqwest client: {}", e)))?;

        Ok(Self { client })
    }

    fn prepare(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let builder = request
            .headers
            .iter()
            .fold(self.client.get(&request.url), |builder, (key, value)| {
                builder.header(key, value)
            });

        match request.timeout {
            Some(deadline) => builder.timeout(deadline),
            None => builder,
        }
    }
}

fn classify(url: &str, error: reqwest::Error) -> BridgeError {
    if error.is_timeout() {
        BridgeError::Timeout(format!("GET {}", url))
    } else {
        BridgeError::OperationFailed(format!("GET {}: {}", url, error))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.prepare(&request).send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Catalog request failed");
            classify(&request.url, e)
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&request.url, e))?;

        debug!(url = %request.url, status, bytes = body.len(), "Catalog response");
        Ok(HttpResponse { status, body })
    }
}
