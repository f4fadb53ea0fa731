//! Keyed cache of async results
//!
//! ## Overview
//!
//! [`QueryClient`] stores the last result of every query as JSON, keyed by
//! [`QueryKey`], and decides per read whether to serve it or fetch again:
//!
//! - **Fresh** data (younger than the stale time and not invalidated) is
//!   returned without fetching.
//! - **Stale** data is returned immediately while a background refetch runs,
//!   or the read waits for the refetch, per [`StalePolicy`].
//! - **No data** means the read waits for a fetch. The app-wide
//!   [`LoadingTracker`] is held while it runs.
//!
//! At most one fetch per key is in flight. Fetches run on their own task and
//! are shared by every reader of the key, so a reader that stops waiting
//! (see [`QueryClient::query_with_cancel`]) does not abort the fetch; the
//! result still lands in the cache.
//!
//! Successful writes schedule a debounced snapshot through the configured
//! [`Persister`].

use crate::error::{QueryError, Result};
use crate::key::QueryKey;
use crate::options::{QueryOptions, RetryPolicy, StalePolicy};
use crate::state::QueryState;
use bridge_traits::{Clock, SystemClock};
use core_cache::{DehydratedQuery, DehydratedState, PersistedSnapshot, Persister};
use core_runtime::config::{HubConfig, DEFAULT_CACHE_TTL};
use core_runtime::events::{CoreEvent, EventBus, QueryEvent};
use core_runtime::LoadingTracker;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

type FetchResult = std::result::Result<Value, QueryError>;
type InFlight = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Default)]
struct Entry {
    data: Option<Value>,
    data_updated_at: i64,
    error: Option<QueryError>,
    invalidated: bool,
    in_flight: Option<(u64, InFlight)>,
}

impl Entry {
    fn is_fresh(&self, now_ms: i64, stale_time: Duration) -> bool {
        let age_ms = now_ms.saturating_sub(self.data_updated_at);
        self.data.is_some() && !self.invalidated && (age_ms as i128) < stale_time.as_millis() as i128
    }

    fn state<T: DeserializeOwned>(&self, key: &QueryKey) -> QueryState<T> {
        let is_fetching = self.in_flight.is_some();
        let data_updated_at = self.data.as_ref().map(|_| self.data_updated_at);

        let (data, error) = match &self.data {
            Some(value) => match serde_json::from_value::<T>(value.clone()) {
                Ok(data) => (Some(data), self.error.clone()),
                Err(e) => (None, Some(QueryError::serialization(key, e))),
            },
            None => (None, self.error.clone()),
        };

        QueryState {
            is_loading: is_fetching && data.is_none(),
            is_fetching,
            data_updated_at,
            data,
            error,
        }
    }
}

struct Persistence {
    persister: Arc<dyn Persister>,
    buster: String,
    debounce: Duration,
    scheduled: AtomicBool,
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    clock: Arc<dyn Clock>,
    stale_time: Duration,
    query_retry: RetryPolicy,
    mutation_retry: RetryPolicy,
    events: EventBus,
    loading: LoadingTracker,
    persistence: Option<Persistence>,
    next_fetch_id: AtomicU64,
}

impl Inner {
    fn now_ms(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }

    fn emit(&self, event: QueryEvent) {
        // No subscribers is fine
        let _ = self.events.emit(CoreEvent::Query(event));
    }

    async fn complete(
        self: &Arc<Self>,
        key: &QueryKey,
        fetch_id: u64,
        outcome: FetchResult,
        attempts: u32,
        started: Instant,
    ) -> FetchResult {
        let now = self.now_ms();
        let mut stored = false;

        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get_mut(key) {
                if matches!(&entry.in_flight, Some((id, _)) if *id == fetch_id) {
                    entry.in_flight = None;
                    match &outcome {
                        Ok(value) => {
                            entry.data = Some(value.clone());
                            entry.data_updated_at = now;
                            entry.error = None;
                            entry.invalidated = false;
                            stored = true;
                        }
                        Err(error) => entry.error = Some(error.clone()),
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => {
                debug!(key = %key, attempts, duration_ms, "Query fetched");
                self.emit(QueryEvent::FetchSucceeded {
                    key: key.to_string(),
                    attempts,
                    duration_ms,
                });
            }
            Err(error) => {
                warn!(key = %key, attempts, error = %error, "Query failed");
                self.emit(QueryEvent::FetchFailed {
                    key: key.to_string(),
                    attempts,
                    message: error.to_string(),
                });
            }
        }

        if stored {
            self.schedule_persist();
        }
        outcome
    }

    async fn dehydrate(&self) -> DehydratedState {
        let entries = self.entries.lock().await;
        let mut queries: Vec<DehydratedQuery> = entries
            .iter()
            .filter_map(|(key, entry)| {
                entry.data.as_ref().map(|data| DehydratedQuery {
                    query_key: key.parts().to_vec(),
                    data: data.clone(),
                    data_updated_at: entry.data_updated_at,
                })
            })
            .collect();
        queries.sort_by(|a, b| a.query_key.cmp(&b.query_key));

        DehydratedState { queries }
    }

    fn schedule_persist(self: &Arc<Self>) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if persistence.scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(self);
        let debounce = persistence.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.persist_now().await;
        });
    }

    async fn persist_now(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        persistence.scheduled.store(false, Ordering::SeqCst);

        let snapshot = PersistedSnapshot::new(
            self.now_ms(),
            persistence.buster.clone(),
            self.dehydrate().await,
        );
        persistence.persister.persist(&snapshot).await;
    }
}

/// Runs `fetch` until it succeeds or `retry` gives up.
///
/// Returns the outcome and the number of attempts made.
async fn run_with_retry<T, E, F, Fut>(
    key: &QueryKey,
    retry: &RetryPolicy,
    fetch: &F,
) -> (std::result::Result<T, QueryError>, u32)
where
    E: StdError + Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch().await {
            Ok(data) => return (Ok(data), attempt),
            Err(error) => {
                let error: Arc<dyn StdError + Send + Sync + 'static> = Arc::new(error);
                if !retry.should_retry(attempt, error.as_ref()) {
                    return (
                        Err(QueryError::Failed {
                            key: key.clone(),
                            attempts: attempt,
                            source: error,
                        }),
                        attempt,
                    );
                }

                let delay = retry.delay_for(attempt);
                warn!(
                    key = %key,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Shared, cloneable query cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn builder() -> QueryClientBuilder {
        QueryClientBuilder::default()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn loading(&self) -> &LoadingTracker {
        &self.inner.loading
    }

    /// Reads `key`, fetching with `fetch` when there is no fresh data.
    ///
    /// A disabled query returns [`QueryState::idle`] and never calls `fetch`.
    /// Fetch errors end up in [`QueryState::error`], next to any previous
    /// data.
    pub async fn query<T, E, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetch: F,
    ) -> QueryState<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        if !options.enabled {
            return QueryState::idle();
        }
        self.resolve(key, options, None, fetch).await
    }

    /// Like [`query`](Self::query), but stops waiting once `token` is
    /// cancelled and reports [`QueryError::Cancelled`].
    ///
    /// The fetch itself keeps running and still populates the cache.
    pub async fn query_with_cancel<T, E, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        token: CancellationToken,
        fetch: F,
    ) -> QueryState<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        if !options.enabled {
            return QueryState::idle();
        }
        self.resolve(key, options, Some(token), fetch).await
    }

    /// Data for `key`, fetching as needed; errors are returned instead of
    /// being stored in a state.
    ///
    /// `options.enabled` is not consulted.
    pub async fn fetch_query<T, E, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetch: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let state = self
            .resolve(key.clone(), options.stale_policy(StalePolicy::Blocking), None, fetch)
            .await;

        match (state.error, state.data) {
            (Some(error), _) => Err(error),
            (None, Some(data)) => Ok(data),
            (None, None) => Err(QueryError::Task {
                key,
                message: "fetch finished without data".to_string(),
            }),
        }
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn resolve<T, E, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        cancel: Option<CancellationToken>,
        fetch: F,
    ) -> QueryState<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let stale_time = options.stale_time.unwrap_or(self.inner.stale_time);
        let now = self.inner.now_ms();

        let waiter = {
            let mut entries = self.inner.entries.lock().await;
            let entry = entries.entry(key.clone()).or_default();

            if entry.is_fresh(now, stale_time) {
                debug!("Serving fresh data");
                return entry.state(&key);
            }

            let has_data = entry.data.is_some();
            let running = entry.in_flight.as_ref().map(|(_, in_flight)| in_flight.clone());
            let waiter = match running {
                Some(in_flight) => in_flight,
                None => {
                    let retry = options
                        .retry
                        .clone()
                        .unwrap_or_else(|| self.inner.query_retry.clone());
                    self.start_fetch(&key, entry, retry, !has_data, fetch)
                }
            };

            if has_data && options.stale_policy == StalePolicy::Background {
                debug!("Serving stale data while refetching");
                return entry.state(&key);
            }
            waiter
        };

        let outcome = match cancel {
            Some(token) => tokio::select! {
                outcome = waiter => outcome,
                _ = token.cancelled() => Err(QueryError::Cancelled { key: key.clone() }),
            },
            None => waiter.await,
        };

        if let Err(error) = &outcome {
            if error.is_cancelled() {
                debug!("Reader cancelled");
                return QueryState {
                    error: Some(error.clone()),
                    ..QueryState::idle()
                };
            }
        }

        let entries = self.inner.entries.lock().await;
        match (entries.get(&key), outcome) {
            (Some(entry), Ok(_)) => entry.state(&key),
            (Some(entry), Err(error)) => QueryState {
                error: Some(error),
                ..entry.state(&key)
            },
            // Removed while fetching
            (None, Ok(value)) => match serde_json::from_value(value) {
                Ok(data) => QueryState {
                    data: Some(data),
                    ..QueryState::idle()
                },
                Err(e) => QueryState {
                    error: Some(QueryError::serialization(&key, e)),
                    ..QueryState::idle()
                },
            },
            (None, Err(error)) => QueryState {
                error: Some(error),
                ..QueryState::idle()
            },
        }
    }

    /// Spawns the fetch for `key` and registers it as in flight.
    fn start_fetch<T, E, F, Fut>(
        &self,
        key: &QueryKey,
        entry: &mut Entry,
        retry: RetryPolicy,
        blocking: bool,
        fetch: F,
    ) -> InFlight
    where
        T: Serialize + Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let fetch_id = self.inner.next_fetch_id.fetch_add(1, Ordering::SeqCst);
        let guard = blocking.then(|| self.inner.loading.begin());
        self.inner.emit(QueryEvent::FetchStarted {
            key: key.to_string(),
            blocking,
        });

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            let (outcome, attempts) = run_with_retry(&task_key, &retry, &fetch).await;
            let outcome = outcome.and_then(|data| {
                serde_json::to_value(data).map_err(|e| QueryError::serialization(&task_key, e))
            });
            inner
                .complete(&task_key, fetch_id, outcome, attempts, started)
                .await
        });

        let join_key = key.clone();
        let in_flight = async move {
            handle.await.unwrap_or_else(|e| {
                Err(QueryError::Task {
                    key: join_key,
                    message: e.to_string(),
                })
            })
        }
        .boxed()
        .shared();

        entry.in_flight = Some((fetch_id, in_flight.clone()));
        in_flight
    }

    /// Current state of `key` without fetching.
    pub async fn state<T: DeserializeOwned>(&self, key: &QueryKey) -> QueryState<T> {
        let entries = self.inner.entries.lock().await;
        entries
            .get(key)
            .map(|entry| entry.state(key))
            .unwrap_or_default()
    }

    /// Cached data for `key`, fresh or not.
    pub async fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entries = self.inner.entries.lock().await;
        let value = entries.get(key)?.data.clone()?;

        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached data has an unexpected shape");
                None
            }
        }
    }

    /// Stores `data` under `key` as if it had just been fetched.
    pub async fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<()> {
        let value = serde_json::to_value(data).map_err(|e| QueryError::serialization(key, e))?;
        let now = self.inner.now_ms();

        {
            let mut entries = self.inner.entries.lock().await;
            let entry = entries.entry(key.clone()).or_default();
            entry.data = Some(value);
            entry.data_updated_at = now;
            entry.error = None;
            entry.invalidated = false;
        }

        self.inner.schedule_persist();
        Ok(())
    }

    /// Marks every query under `prefix` stale; the next read refetches.
    ///
    /// Returns the number of queries invalidated.
    pub async fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut invalidated = Vec::new();
        {
            let mut entries = self.inner.entries.lock().await;
            for (key, entry) in entries.iter_mut() {
                if key.starts_with(prefix) && entry.data.is_some() {
                    entry.invalidated = true;
                    invalidated.push(key.to_string());
                }
            }
        }

        for key in &invalidated {
            debug!(key = %key, "Query invalidated");
            self.inner.emit(QueryEvent::Invalidated { key: key.clone() });
        }
        invalidated.len()
    }

    /// Drops every query under `prefix` from the cache.
    pub async fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let removed = {
            let mut entries = self.inner.entries.lock().await;
            let before = entries.len();
            entries.retain(|key, _| !key.starts_with(prefix));
            before - entries.len()
        };

        if removed > 0 {
            self.inner.schedule_persist();
        }
        removed
    }

    /// Drops every query.
    pub async fn clear(&self) {
        self.inner.entries.lock().await.clear();
        self.inner.schedule_persist();
    }

    /// Runs a write operation with the mutation retry budget, then
    /// invalidates `invalidates`.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn run_mutation<T, E, F, Fut>(
        &self,
        key: QueryKey,
        invalidates: &[QueryKey],
        mutate: F,
    ) -> Result<T>
    where
        E: StdError + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let (outcome, attempts) = run_with_retry(&key, &self.inner.mutation_retry, &mutate).await;

        match &outcome {
            Ok(_) => {
                debug!(attempts, "Mutation succeeded");
                for prefix in invalidates {
                    self.invalidate_queries(prefix).await;
                }
            }
            Err(error) => warn!(attempts, error = %error, "Mutation failed"),
        }
        outcome
    }

    /// Every query holding data, in key order.
    pub async fn dehydrate(&self) -> DehydratedState {
        self.inner.dehydrate().await
    }

    /// Loads queries from a restored snapshot.
    ///
    /// Cached data newer than the snapshot's is kept. Returns the number of
    /// queries loaded.
    pub async fn hydrate(&self, state: DehydratedState) -> usize {
        let mut entries = self.inner.entries.lock().await;
        let mut loaded = 0;

        for query in state.queries {
            let key = QueryKey::from(query.query_key);
            let entry = entries.entry(key).or_default();

            if entry.data.is_some() && entry.data_updated_at >= query.data_updated_at {
                continue;
            }

            entry.data = Some(query.data);
            entry.data_updated_at = query.data_updated_at;
            entry.error = None;
            entry.invalidated = false;
            loaded += 1;
        }

        info!(loaded, "Hydrated query cache");
        loaded
    }

    /// Writes a snapshot now instead of waiting for the debounce.
    pub async fn flush(&self) {
        self.inner.persist_now().await;
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("stale_time", &self.inner.stale_time)
            .field("query_retry", &self.inner.query_retry)
            .field("persistence", &self.inner.persistence.is_some())
            .finish()
    }
}

/// Builder for [`QueryClient`].
pub struct QueryClientBuilder {
    clock: Arc<dyn Clock>,
    stale_time: Duration,
    query_retry: RetryPolicy,
    mutation_retry: RetryPolicy,
    events: Option<EventBus>,
    loading: Option<LoadingTracker>,
    persistence: Option<Persistence>,
}

impl Default for QueryClientBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            stale_time: DEFAULT_CACHE_TTL,
            query_retry: RetryPolicy::default(),
            mutation_retry: RetryPolicy::for_mutations(&Default::default()),
            events: None,
            loading: None,
            persistence: None,
        }
    }
}

impl QueryClientBuilder {
    /// Clock, stale time and retry budgets from `config`.
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            clock: Arc::clone(&config.clock),
            stale_time: config.cache.ttl,
            query_retry: RetryPolicy::for_queries(&config.query),
            mutation_retry: RetryPolicy::for_mutations(&config.query),
            ..Self::default()
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn query_retry(mut self, retry: RetryPolicy) -> Self {
        self.query_retry = retry;
        self
    }

    pub fn mutation_retry(mut self, retry: RetryPolicy) -> Self {
        self.mutation_retry = retry;
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

    /// Persists a snapshot tagged with `buster` at most once per `debounce`
    /// after the cache changes.
    pub fn persister(
        mut self,
        persister: Arc<dyn Persister>,
        buster: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        self.persistence = Some(Persistence {
            persister,
            buster: buster.into(),
            debounce,
            scheduled: AtomicBool::new(false),
        });
        self
    }

    pub fn build(self) -> QueryClient {
        QueryClient {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                clock: self.clock,
                stale_time: self.stale_time,
                query_retry: self.query_retry,
                mutation_retry: self.mutation_retry,
                events: self.events.unwrap_or_default(),
                loading: self.loading.unwrap_or_default(),
                persistence: self.persistence,
                next_fetch_id: AtomicU64::new(0),
            }),
        }
    }
}
