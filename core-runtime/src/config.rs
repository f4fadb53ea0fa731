//! # Hub Configuration Module
//!
//! Provides configuration management for the podcast hub core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a [`HubConfig`]
//! instance that holds the injected bridges and every static constant the core
//! relies on: catalog endpoints, cache freshness, persistence retries, query
//! retry budgets and list pagination sizes. Validation is fail-fast so a bad
//! endpoint or a zero page size is reported at startup rather than at first
//! use.
//!
//! ## Bridges
//!
//! - `HttpClient` - catalog and relay requests (desktop default: reqwest)
//! - `KeyValueStore` - persisted query cache (desktop default: in-memory)
//! - `Clock` - freshness checks (default: system clock)
//!
//! When the `desktop-shims` feature is disabled the HTTP client and the store
//! must be injected explicitly.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::HubConfig;
//! use std::time::Duration;
//!
//! let config = HubConfig::builder()
//!     .cache_ttl(Duration::from_secs(60 * 60))
//!     .direct_timeout(Duration::from_secs(5))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, KeyValueStore, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Placeholder substituted with the podcast id in the lookup template.
pub const PODCAST_ID_PLACEHOLDER: &str = "{PODCAST_ID}";
/// Optional placeholder substituted with `episodes_limit`.
pub const EPISODES_LIMIT_PLACEHOLDER: &str = "{LIMIT}";

pub const DEFAULT_TOP_PODCASTS_URL: &str =
    "https://itunes.apple.com/us/rss/toppodcasts/limit=100/genre=1310/json";
pub const DEFAULT_PODCAST_LOOKUP_TEMPLATE: &str =
    "https://itunes.apple.com/lookup?id={PODCAST_ID}&media=podcast&entity=podcastEpisode&limit={LIMIT}";
pub const DEFAULT_PROXY_BASE: &str = "https://api.allorigins.win/get?url=";

pub const DEFAULT_STORAGE_KEY: &str = "PODCASTER_CACHE";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_PERSIST_RETRIES: u32 = 3;
pub const DEFAULT_EPISODES_LIMIT: usize = 20;

/// Upstream catalog and relay locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEndpoints {
    /// Top podcasts feed
    pub top_podcasts_url: String,
    /// Lookup URL containing [`PODCAST_ID_PLACEHOLDER`] and, optionally,
    /// [`EPISODES_LIMIT_PLACEHOLDER`]. Without the latter the upstream
    /// default count applies and `episodes_limit` only truncates.
    pub podcast_lookup_template: String,
    /// Relay prefix; the percent-encoded target URL is appended to it
    pub proxy_base: String,
}

impl Default for CatalogEndpoints {
    fn default() -> Self {
        Self {
            top_podcasts_url: DEFAULT_TOP_PODCASTS_URL.to_string(),
            podcast_lookup_template: DEFAULT_PODCAST_LOOKUP_TEMPLATE.to_string(),
            proxy_base: DEFAULT_PROXY_BASE.to_string(),
        }
    }
}

impl CatalogEndpoints {
    pub fn validate(&self) -> Result<()> {
        check_http_url("top_podcasts_url", &self.top_podcasts_url)?;
        check_http_url("podcast_lookup_template", &self.podcast_lookup_template)?;
        check_http_url("proxy_base", &self.proxy_base)?;

        if !self.podcast_lookup_template.contains(PODCAST_ID_PLACEHOLDER) {
            return Err(Error::InvalidEndpoint {
                field: "podcast_lookup_template",
                value: self.podcast_lookup_template.clone(),
                reason: format!("must contain {}", PODCAST_ID_PLACEHOLDER),
            });
        }

        Ok(())
    }
}

fn check_http_url(field: &'static str, value: &str) -> Result<()> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::InvalidEndpoint {
            field,
            value: value.to_string(),
            reason: "must start with http:// or https://".to_string(),
        })
    }
}

/// Persisted cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Freshness window of a cached result, also the max age of a restorable snapshot
    pub ttl: Duration,
    /// Write attempts before a snapshot is abandoned
    pub max_persist_retries: u32,
    /// Storage key holding the current snapshot
    pub storage_key: String,
    /// Snapshots written under a different buster are discarded on restore
    pub buster: String,
    /// Snapshot generations kept in storage, current one included
    pub max_generations: usize,
    /// Quiet period before a cache change is written out
    pub persist_debounce: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_persist_retries: DEFAULT_MAX_PERSIST_RETRIES,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            buster: env!("CARGO_PKG_VERSION").to_string(),
            max_generations: 4,
            persist_debounce: Duration::from_secs(1),
        }
    }
}

/// Per-attempt fetch timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// A direct attempt slower than this counts as failed and the relay is tried
    pub direct_timeout: Duration,
    pub proxy_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            direct_timeout: Duration::from_secs(10),
            proxy_timeout: Duration::from_secs(30),
        }
    }
}

/// Retry budgets of the query client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Retries after the first failed query attempt
    pub retry: u32,
    /// Retries after the first failed mutation attempt
    pub mutation_retry: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            retry: 2,
            mutation_retry: 1,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

/// List window sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub initial_load: usize,
    pub load_increment: usize,
    /// Distance from the end of the list, in pixels, that triggers a load
    pub infinite_scroll_threshold_px: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            initial_load: 20,
            load_increment: 15,
            infinite_scroll_threshold_px: 200,
        }
    }
}

/// Hub configuration.
///
/// Holds all dependencies and settings required to initialize the podcast
/// hub. Use [`HubConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct HubConfig {
    pub endpoints: CatalogEndpoints,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub query: QueryConfig,
    pub pagination: PaginationConfig,
    /// Maximum number of episodes kept per podcast detail
    pub episodes_limit: usize,

    pub http_client: Arc<dyn HttpClient>,
    pub storage: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("endpoints", &self.endpoints)
            .field("cache", &self.cache)
            .field("fetch", &self.fetch)
            .field("query", &self.query)
            .field("pagination", &self.pagination)
            .field("episodes_limit", &self.episodes_limit)
            .field("http_client", &"HttpClient { ... }")
            .field("storage", &"KeyValueStore { ... }")
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl HubConfig {
    /// Creates a new builder for constructing a `HubConfig`.
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Endpoints are http(s) URLs and the lookup template has its placeholder
    /// - Cache TTL, persistence retries and generation count are non-zero
    /// - Pagination sizes and the episode cap are non-zero
    /// - Retry delays are ordered
    pub fn validate(&self) -> Result<()> {
        self.endpoints.validate()?;

        if self.cache.ttl.is_zero() {
            return Err(Error::Config("Cache TTL must be greater than zero".to_string()));
        }

        if self.cache.max_persist_retries == 0 {
            return Err(Error::Config(
                "Persistence retries must be at least 1".to_string(),
            ));
        }

        if self.cache.storage_key.trim().is_empty() {
            return Err(Error::Config("Cache storage key cannot be empty".to_string()));
        }

        if self.cache.max_generations == 0 {
            return Err(Error::Config(
                "At least one snapshot generation must be kept".to_string(),
            ));
        }

        if self.fetch.direct_timeout.is_zero() || self.fetch.proxy_timeout.is_zero() {
            return Err(Error::Config(
                "Fetch timeouts must be greater than zero".to_string(),
            ));
        }

        if self.query.retry_base_delay > self.query.retry_max_delay {
            return Err(Error::Config(format!(
                "Retry base delay ({:?}) exceeds max delay ({:?})",
                self.query.retry_base_delay, self.query.retry_max_delay
            )));
        }

        if self.pagination.initial_load == 0 || self.pagination.load_increment == 0 {
            return Err(Error::Config(
                "Pagination initial load and increment must be greater than zero".to_string(),
            ));
        }

        if self.episodes_limit == 0 {
            return Err(Error::Config(
                "Episode limit must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the podcast catalog. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject a platform HTTP client."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn storage_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "KeyValueStore".to_string(),
        message: "KeyValueStore implementation is required for the persisted query cache. \
                 Desktop: enable the 'desktop-shims' feature or inject SqliteKeyValueStore. \
                 Web: inject a localStorage-backed store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(fetch: &FetchConfig) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(fetch.proxy_timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_fetch: &FetchConfig) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_storage() -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::MemoryKeyValueStore;

    Ok(Arc::new(MemoryKeyValueStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_storage() -> Result<Arc<dyn KeyValueStore>> {
    Err(storage_missing_error())
}

/// Builder for constructing [`HubConfig`] instances.
///
/// Every setting has a default; bridges fall back to the desktop shims when
/// that feature is enabled. Call [`build()`](HubConfigBuilder::build) to
/// resolve defaults and validate.
#[derive(Default)]
pub struct HubConfigBuilder {
    endpoints: CatalogEndpoints,
    cache: CacheConfig,
    fetch: FetchConfig,
    query: QueryConfig,
    pagination: PaginationConfig,
    episodes_limit: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl HubConfigBuilder {
    /// Replaces all catalog endpoints.
    pub fn endpoints(mut self, endpoints: CatalogEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn top_podcasts_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.top_podcasts_url = url.into();
        self
    }

    /// Sets the lookup URL template.
    ///
    /// The template must contain `{PODCAST_ID}`.
    pub fn podcast_lookup_template(mut self, template: impl Into<String>) -> Self {
        self.endpoints.podcast_lookup_template = template.into();
        self
    }

    pub fn proxy_base(mut self, base: impl Into<String>) -> Self {
        self.endpoints.proxy_base = base.into();
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the freshness window of cached results.
    ///
    /// Default: 24 hours
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.cache.storage_key = key.into();
        self
    }

    pub fn cache_buster(mut self, buster: impl Into<String>) -> Self {
        self.cache.buster = buster.into();
        self
    }

    /// Sets how long cache changes settle before being persisted.
    ///
    /// Default: 1 second
    pub fn persist_debounce(mut self, debounce: Duration) -> Self {
        self.cache.persist_debounce = debounce;
        self
    }

    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Sets the time allowed for a direct request before falling back to the relay.
    ///
    /// Default: 10 seconds
    pub fn direct_timeout(mut self, timeout: Duration) -> Self {
        self.fetch.direct_timeout = timeout;
        self
    }

    pub fn query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    /// Sets the base and maximum delay between retries.
    pub fn retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.query.retry_base_delay = base;
        self.query.retry_max_delay = max;
        self
    }

    pub fn pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn episodes_limit(mut self, limit: usize) -> Self {
        self.episodes_limit = Some(limit);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the key-value store backing the persisted cache.
    ///
    /// If not provided, an in-memory store is used when the `desktop-shims`
    /// feature is enabled.
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `HubConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns an error if:
    /// - A required bridge is missing and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<HubConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&self.fetch)?,
        };

        let storage = match self.storage {
            Some(storage) => storage,
            None => provide_default_storage()?,
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let config = HubConfig {
            endpoints: self.endpoints,
            cache: self.cache,
            fetch: self.fetch,
            query: self.query,
            pagination: self.pagination,
            episodes_limit: self.episodes_limit.unwrap_or(DEFAULT_EPISODES_LIMIT),
            http_client,
            storage,
            clock,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubHttpClient;

    #[async_trait]
    impl HttpClient for StubHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(200, "{}"))
        }
    }

    #[derive(Default)]
    struct StubStore {
        items: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl KeyValueStore for StubStore {
        async fn get_item(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.items.lock().unwrap().get(key).cloned())
        }

        async fn set_item(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.items
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove_item(&self, key: &str) -> BridgeResult<()> {
            self.items.lock().unwrap().remove(key);
            Ok(())
        }

        async fn keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.items.lock().unwrap().keys().cloned().collect())
        }

        async fn clear(&self) -> BridgeResult<()> {
            self.items.lock().unwrap().clear();
            Ok(())
        }
    }

    fn builder_with_bridges() -> HubConfigBuilder {
        HubConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .storage(Arc::new(StubStore::default()))
    }

    #[test]
    fn test_defaults() {
        let config = builder_with_bridges().build().unwrap();

        assert_eq!(config.endpoints.top_podcasts_url, DEFAULT_TOP_PODCASTS_URL);
        assert_eq!(config.cache.ttl, Duration::from_secs(86_400));
        assert_eq!(config.cache.max_persist_retries, 3);
        assert_eq!(config.cache.storage_key, "PODCASTER_CACHE");
        assert_eq!(config.query.retry, 2);
        assert_eq!(config.query.mutation_retry, 1);
        assert_eq!(config.pagination.initial_load, 20);
        assert_eq!(config.pagination.load_increment, 15);
        assert_eq!(config.episodes_limit, 20);
    }

    #[test]
    fn test_lookup_template_requires_placeholder() {
        let result = builder_with_bridges()
            .podcast_lookup_template("https://itunes.apple.com/lookup?id=1")
            .build();

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidEndpoint {
                field: "podcast_lookup_template",
                ..
            }
        ));
    }

    #[test]
    fn test_proxy_base_must_be_http() {
        let err = builder_with_bridges()
            .proxy_base("relay.local/get?url=")
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("proxy_base"));
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(builder_with_bridges()
            .cache_ttl(Duration::ZERO)
            .build()
            .is_err());

        assert!(builder_with_bridges()
            .pagination(PaginationConfig {
                initial_load: 0,
                ..PaginationConfig::default()
            })
            .build()
            .is_err());

        assert!(builder_with_bridges().episodes_limit(0).build().is_err());

        assert!(builder_with_bridges()
            .direct_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_retry_delays_must_be_ordered() {
        let err = builder_with_bridges()
            .retry_delays(Duration::from_secs(10), Duration::from_secs(1))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("Retry base delay"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let err = HubConfig::builder()
            .storage(Arc::new(StubStore::default()))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            Error::CapabilityMissing { ref capability, .. } if capability == "HttpClient"
        ));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_storage() {
        let err = HubConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("KeyValueStore"));
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_build_with_desktop_defaults() {
        let config = HubConfig::builder()
            .build()
            .expect("desktop defaults should succeed");

        config.storage.set_item("theme", "dark").await.unwrap();
        assert_eq!(
            config.storage.get_item("theme").await.unwrap().as_deref(),
            Some("dark")
        );
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = builder_with_bridges().build().unwrap();
        let debug = format!("{:?}", config);

        assert!(debug.contains("HttpClient { ... }"));
        assert!(debug.contains("PODCASTER_CACHE"));
    }
}
