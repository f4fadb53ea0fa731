//! Podcast hub: the entry point a presentation layer talks to

use crate::error::Result;
use core_cache::StoragePersister;
use core_catalog::{
    ApiPodcastRepository, CatalogError, Episode, Podcast, PodcastDetail, PodcastRepository,
};
use core_library::PodcastList;
use core_query::{QueryClient, QueryClientBuilder, QueryKey, QueryOptions, QueryState, RetryPolicy};
use core_runtime::config::{HubConfig, QueryConfig};
use core_runtime::events::EventBus;
use core_runtime::LoadingTracker;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

type CatalogFuture<T> = Pin<Box<dyn Future<Output = core_catalog::Result<T>> + Send>>;

struct HubInner {
    config: HubConfig,
    repository: Arc<dyn PodcastRepository>,
    client: QueryClient,
    persister: Arc<StoragePersister>,
    events: EventBus,
    loading: LoadingTracker,
}

/// Cached access to the podcast catalog.
///
/// Cloning is cheap and shares the cache, event bus and loading flag.
#[derive(Clone)]
pub struct PodcastHub {
    inner: Arc<HubInner>,
}

impl PodcastHub {
    pub fn builder(config: HubConfig) -> PodcastHubBuilder {
        PodcastHubBuilder::new(config)
    }

    pub fn new(config: HubConfig) -> Self {
        Self::builder(config).build()
    }

    /// Builds the hub and warms the cache from the persisted snapshot.
    pub async fn start(config: HubConfig) -> Self {
        let hub = Self::new(config);
        hub.restore_cache().await;
        hub
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// App-wide loading flag, on while a query without data is fetching.
    pub fn loading(&self) -> &LoadingTracker {
        &self.inner.loading
    }

    pub fn query_client(&self) -> &QueryClient {
        &self.inner.client
    }

    /// Loads the persisted snapshot if it is recent enough and written by
    /// this version. Returns the number of queries restored.
    #[instrument(skip(self))]
    pub async fn restore_cache(&self) -> usize {
        let cache = &self.inner.config.cache;
        let snapshot = self
            .inner
            .persister
            .restore_valid(self.inner.config.clock.as_ref(), cache.ttl, &cache.buster)
            .await;

        match snapshot {
            Some(snapshot) => self.inner.client.hydrate(snapshot.client_state).await,
            None => {
                debug!("No usable cache snapshot");
                0
            }
        }
    }

    fn options(&self) -> QueryOptions {
        QueryOptions::new().retry(catalog_retry(&self.inner.config.query))
    }

    fn podcasts_fetch(
        &self,
    ) -> impl Fn() -> CatalogFuture<Vec<Podcast>> + Send + Sync + 'static {
        let repository = Arc::clone(&self.inner.repository);
        move || {
            let repository = Arc::clone(&repository);
            Box::pin(async move { repository.get_podcasts().await }) as CatalogFuture<_>
        }
    }

    fn detail_fetch(
        &self,
        podcast_id: &str,
    ) -> impl Fn() -> CatalogFuture<PodcastDetail> + Send + Sync + 'static {
        let repository = Arc::clone(&self.inner.repository);
        let podcast_id = podcast_id.to_string();
        move || {
            let repository = Arc::clone(&repository);
            let podcast_id = podcast_id.clone();
            Box::pin(async move { repository.get_podcast_detail(&podcast_id).await })
                as CatalogFuture<_>
        }
    }

    /// Top podcasts.
    pub async fn podcasts(&self) -> QueryState<Vec<Podcast>> {
        self.inner
            .client
            .query(QueryKey::podcasts(), self.options(), self.podcasts_fetch())
            .await
    }

    /// Top podcasts, or the error of the last attempt.
    pub async fn fetch_podcasts(&self) -> Result<Vec<Podcast>> {
        Ok(self
            .inner
            .client
            .fetch_query(QueryKey::podcasts(), self.options(), self.podcasts_fetch())
            .await?)
    }

    /// Detail of one podcast.
    ///
    /// An empty id is a disabled query: idle state, nothing fetched. The
    /// summary is taken from the top podcasts list when that list is cached
    /// and has one, since the lookup endpoint's is weaker.
    pub async fn podcast_detail(&self, podcast_id: &str) -> QueryState<PodcastDetail> {
        let state = self
            .inner
            .client
            .query(
                QueryKey::podcast_detail(podcast_id),
                self.options().enabled(!podcast_id.is_empty()),
                self.detail_fetch(podcast_id),
            )
            .await;
        self.enrich(state).await
    }

    /// Like [`podcast_detail`](Self::podcast_detail), but gives up waiting
    /// once `token` is cancelled. The fetch still completes into the cache.
    pub async fn podcast_detail_with_cancel(
        &self,
        podcast_id: &str,
        token: CancellationToken,
    ) -> QueryState<PodcastDetail> {
        let state = self
            .inner
            .client
            .query_with_cancel(
                QueryKey::podcast_detail(podcast_id),
                self.options().enabled(!podcast_id.is_empty()),
                token,
                self.detail_fetch(podcast_id),
            )
            .await;
        self.enrich(state).await
    }

    /// One episode of a podcast.
    ///
    /// `Ok(None)` means the podcast loaded but has no such episode; a failed
    /// load is an error.
    #[instrument(skip(self))]
    pub async fn episode(&self, podcast_id: &str, episode_id: &str) -> Result<Option<Episode>> {
        if podcast_id.is_empty() {
            return Ok(None);
        }

        let detail = self
            .inner
            .client
            .fetch_query(
                QueryKey::podcast_detail(podcast_id),
                self.options(),
                self.detail_fetch(podcast_id),
            )
            .await?;

        let episode = detail.episode(episode_id).cloned();
        if episode.is_none() {
            info!(episodes = detail.episodes.len(), "Episode not found in podcast");
        }
        Ok(episode)
    }

    /// A list view over the top podcasts, paginated per configuration.
    pub async fn podcast_list(&self) -> Result<PodcastList> {
        let podcasts = self.fetch_podcasts().await?;
        Ok(PodcastList::from_config(&self.inner.config.pagination)?.with_items(podcasts))
    }

    /// Marks the top podcasts stale so the next read refetches.
    pub async fn refresh_podcasts(&self) {
        self.inner
            .client
            .invalidate_queries(&QueryKey::podcasts())
            .await;
    }

    pub async fn refresh_podcast_detail(&self, podcast_id: &str) {
        self.inner
            .client
            .invalidate_queries(&QueryKey::podcast_detail(podcast_id))
            .await;
    }

    /// Writes the cache snapshot now; call before the process exits.
    pub async fn shutdown(&self) {
        self.inner.client.flush().await;
    }

    async fn enrich(&self, state: QueryState<PodcastDetail>) -> QueryState<PodcastDetail> {
        if state.data.is_none() {
            return state;
        }

        let listed = self
            .inner
            .client
            .get_query_data::<Vec<Podcast>>(&QueryKey::podcasts())
            .await;
        state.map(|detail| with_listed_summary(detail, listed.as_deref()))
    }
}

impl std::fmt::Debug for PodcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodcastHub")
            .field("config", &self.inner.config)
            .field("client", &self.inner.client)
            .finish()
    }
}

/// Query retry that gives up at once on errors another attempt cannot fix.
fn catalog_retry(config: &QueryConfig) -> RetryPolicy {
    RetryPolicy::for_queries(config).retry_if(|error| {
        error
            .downcast_ref::<CatalogError>()
            .map_or(true, CatalogError::is_retryable)
    })
}

fn with_listed_summary(mut detail: PodcastDetail, listed: Option<&[Podcast]>) -> PodcastDetail {
    let summary = listed
        .and_then(|podcasts| podcasts.iter().find(|podcast| podcast.id == detail.id))
        .map(|podcast| podcast.summary.as_str())
        .filter(|summary| !summary.is_empty());

    if let Some(summary) = summary {
        detail.summary = summary.to_string();
    }
    detail
}

/// Builder for [`PodcastHub`].
pub struct PodcastHubBuilder {
    config: HubConfig,
    repository: Option<Arc<dyn PodcastRepository>>,
    events: Option<EventBus>,
    loading: Option<LoadingTracker>,
}

impl PodcastHubBuilder {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            repository: None,
            events: None,
            loading: None,
        }
    }

    /// Replaces the catalog-backed repository.
    pub fn repository(mut self, repository: Arc<dyn PodcastRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn loading(mut self, loading: LoadingTracker) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn build(self) -> PodcastHub {
        let config = self.config;
        let events = self.events.unwrap_or_default();
        let loading = self.loading.unwrap_or_default();
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(ApiPodcastRepository::from_config(&config)));

        let persister =
            Arc::new(StoragePersister::from_config(&config).with_events(events.clone()));
        let client = QueryClientBuilder::from_config(&config)
            .events(events.clone())
            .loading(loading.clone())
            .persister(
                persister.clone(),
                config.cache.buster.clone(),
                config.cache.persist_debounce,
            )
            .build();

        info!(
            storage_key = %config.cache.storage_key,
            ttl_secs = config.cache.ttl.as_secs(),
            "Podcast hub ready"
        );

        PodcastHub {
            inner: Arc::new(HubInner {
                config,
                repository,
                client,
                persister,
                events,
                loading,
            }),
        }
    }
}
