//! Resilient JSON fetching
//!
//! Some deployments cannot reach the catalog directly (the browser host
//! enforces CORS on it), so every request goes through two routes in order:
//!
//! 1. **Direct**: `GET url`. Succeeds on a 2xx status with a body that
//!    deserializes into the requested type.
//! 2. **Proxy**: `GET {proxy_base}{percent-encoded url}`. The relay answers
//!    `{ "contents": "<payload as a JSON string>", "status": {...} }`; the
//!    envelope must be 2xx, carry non-empty `contents`, and `contents` must
//!    parse into the requested type.
//!
//! The relay is only asked after the direct attempt has definitively failed
//! (including by timing out); the two are never raced.

use crate::error::{FetchError, FetchFailure, FetchPath};
use bridge_traits::{BridgeError, HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::{FetchConfig, HubConfig};
use core_runtime::logging::redact_url_query;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Envelope returned by the relay.
#[derive(Debug, Deserialize)]
struct RelayEnvelope {
    #[serde(default)]
    contents: Option<String>,
    #[serde(default)]
    status: Option<RelayStatus>,
}

#[derive(Debug, Deserialize)]
struct RelayStatus {
    #[serde(default)]
    http_code: Option<u16>,
}

/// Direct-then-relay fetcher.
pub struct ResilientFetcher {
    http_client: Arc<dyn HttpClient>,
    proxy_base: String,
    config: FetchConfig,
}

impl ResilientFetcher {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        proxy_base: impl Into<String>,
        config: FetchConfig,
    ) -> Self {
        Self {
            http_client,
            proxy_base: proxy_base.into(),
            config,
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(
            Arc::clone(&config.http_client),
            config.endpoints.proxy_base.clone(),
            config.fetch,
        )
    }

    /// Relay URL for `url`.
    pub fn proxy_url(&self, url: &str) -> String {
        format!("{}{}", self.proxy_base, urlencoding::encode(url))
    }

    /// Fetches `url` and deserializes its JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] carrying both failure reasons when the direct
    /// request and the relay both fail.
    #[instrument(skip(self, url), fields(url = %redact_url_query(url)))]
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let direct = match self.fetch_direct(url).await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        warn!(
            path = %FetchPath::Direct,
            error = %direct,
            "Direct fetch failed, falling back to proxy"
        );

        match self.fetch_via_proxy(url).await {
            Ok(value) => {
                debug!(path = %FetchPath::Proxy, "Fetched through proxy");
                Ok(value)
            }
            Err(proxy) => {
                error!(
                    url = %url,
                    direct_error = %direct,
                    proxy_error = %proxy,
                    "Both direct and proxy failed"
                );
                Err(FetchError {
                    url: url.to_string(),
                    direct,
                    proxy,
                })
            }
        }
    }

    async fn fetch_direct<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchFailure> {
        let response = self.get(url, self.config.direct_timeout).await?;

        serde_json::from_slice(&response.body)
            .map_err(|e| FetchFailure::InvalidJson(e.to_string()))
    }

    async fn fetch_via_proxy<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchFailure> {
        let proxy_url = self.proxy_url(url);
        let response = self.get(&proxy_url, self.config.proxy_timeout).await?;

        let envelope: RelayEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| FetchFailure::InvalidJson(e.to_string()))?;

        if let Some(code) = envelope.status.as_ref().and_then(|s| s.http_code) {
            debug!(upstream_status = code, "Proxy envelope received");
        }

        let contents = envelope
            .contents
            .filter(|contents| !contents.is_empty())
            .ok_or(FetchFailure::MissingContents)?;

        serde_json::from_str(&contents).map_err(|e| FetchFailure::InvalidContents(e.to_string()))
    }

    /// One GET with a hard deadline, non-2xx mapped to a failure.
    ///
    /// The deadline is enforced here as well as passed to the client, so a
    /// client that ignores per-request timeouts still cannot stall fallback.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchFailure> {
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(timeout);

        let response = match tokio::time::timeout(timeout, self.http_client.execute(request)).await
        {
            Err(_) | Ok(Err(BridgeError::Timeout(_))) => {
                return Err(FetchFailure::Timeout {
                    after_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => return Err(FetchFailure::Network(e.to_string())),
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            return Err(FetchFailure::Status {
                status: response.status,
            });
        }

        Ok(response)
    }
}
