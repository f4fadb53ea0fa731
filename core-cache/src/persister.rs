//! Best-effort snapshot persistence
//!
//! Nothing in here fails its caller. A full store, a serialization error or a
//! corrupted value all degrade to "operate without a persisted cache", with
//! the cause logged and reported on the event bus.

use crate::generations::{Generation, SnapshotGenerations};
use crate::snapshot::PersistedSnapshot;
use async_trait::async_trait;
use bridge_traits::{Clock, KeyValueStore};
use core_runtime::config::HubConfig;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Storage for the query cache snapshot.
#[async_trait]
pub trait Persister: Send + Sync {
    /// Writes `snapshot`, replacing any previous one.
    async fn persist(&self, snapshot: &PersistedSnapshot);

    /// Reads the stored snapshot; `None` when absent or unreadable.
    async fn restore(&self) -> Option<PersistedSnapshot>;

    /// Deletes the stored snapshot.
    async fn remove(&self);
}

/// [`Persister`] over a [`KeyValueStore`].
pub struct StoragePersister {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    max_retries: u32,
    generations: Arc<SnapshotGenerations>,
    events: Option<EventBus>,
}

impl StoragePersister {
    /// # Arguments
    ///
    /// * `max_retries` - write attempts on quota exhaustion (at least one
    ///   attempt is always made)
    /// * `max_generations` - snapshot keys tracked for quota recovery
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        max_retries: u32,
        max_generations: NonZeroUsize,
    ) -> Self {
        let generations = Arc::new(SnapshotGenerations::new(
            Arc::clone(&storage),
            max_generations,
        ));

        Self {
            storage,
            key: key.into(),
            max_retries: max_retries.max(1),
            generations,
            events: None,
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        let max_generations =
            NonZeroUsize::new(config.cache.max_generations).unwrap_or(NonZeroUsize::MIN);

        Self::new(
            Arc::clone(&config.storage),
            config.cache.storage_key.clone(),
            config.cache.max_persist_retries,
            max_generations,
        )
    }

    /// Shares a generation registry with other persisters on the same store.
    pub fn with_generations(mut self, generations: Arc<SnapshotGenerations>) -> Self {
        self.generations = generations;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generations(&self) -> &Arc<SnapshotGenerations> {
        &self.generations
    }

    /// Restores a snapshot only if it is younger than `max_age` and was
    /// written with `buster`.
    ///
    /// A snapshot failing either check is removed from storage.
    #[instrument(skip(self, clock), fields(key = %self.key))]
    pub async fn restore_valid(
        &self,
        clock: &dyn Clock,
        max_age: Duration,
        buster: &str,
    ) -> Option<PersistedSnapshot> {
        let snapshot = self.restore().await?;
        let now_ms = clock.unix_timestamp_millis();

        match snapshot.check(now_ms, max_age, buster) {
            Ok(()) => {
                let queries = snapshot.client_state.queries.len();
                let age_ms = snapshot.age_ms(now_ms);
                info!(queries, age_ms, "Restored cache snapshot");
                self.emit(CacheEvent::Restored {
                    storage_key: self.key.clone(),
                    queries,
                    age_ms,
                });
                Some(snapshot)
            }
            Err(reason) => {
                info!(reason = %reason, "Discarding cache snapshot");
                self.remove().await;
                self.emit(CacheEvent::Discarded {
                    storage_key: self.key.clone(),
                    reason: reason.to_string(),
                });
                None
            }
        }
    }

    async fn log_usage(&self) {
        match self.storage.usage().await {
            Ok(usage) => warn!(
                total_bytes = usage.total_bytes,
                key_count = usage.key_count,
                "Storage quota exceeded"
            ),
            Err(e) => warn!(error = %e, "Storage quota exceeded, usage unavailable"),
        }
    }

    fn abandon(&self, attempts: u32, reason: String) {
        self.emit(CacheEvent::PersistAbandoned {
            storage_key: self.key.clone(),
            attempts,
            reason,
        });
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(events) = &self.events {
            // No subscribers is fine
            let _ = events.emit(CoreEvent::Cache(event));
        }
    }
}

#[async_trait]
impl Persister for StoragePersister {
    #[instrument(skip(self, snapshot), fields(key = %self.key))]
    async fn persist(&self, snapshot: &PersistedSnapshot) {
        let serialized = match serde_json::to_string(snapshot) {
            Ok(serialized) => serialized,
            Err(e) => {
                error!(error = %e, "Failed to serialize cache snapshot");
                self.abandon(0, e.to_string());
                return;
            }
        };
        let bytes = serialized.len() as u64;

        let mut attempts = 0;
        while attempts < self.max_retries {
            attempts += 1;

            match self.storage.set_item(&self.key, &serialized).await {
                Ok(()) => {
                    debug!(bytes, attempts, "Persisted cache snapshot");

                    let generation = Generation {
                        key: self.key.clone(),
                        bytes,
                        written_at: snapshot.timestamp,
                    };
                    if let Err(e) = self.generations.record(generation).await {
                        warn!(error = %e, "Failed to record snapshot generation");
                    }

                    self.emit(CacheEvent::Persisted {
                        storage_key: self.key.clone(),
                        bytes,
                        attempts,
                    });
                    return;
                }
                Err(e) if e.is_quota_exceeded() => {
                    warn!(attempt = attempts, error = %e, "Cache persistence attempt failed");
                    self.log_usage().await;

                    if let Err(e) = self.generations.prune_for_quota(&self.key).await {
                        error!(error = %e, "Failed to clear old cache entries");
                    }

                    if attempts == self.max_retries {
                        error!(
                            attempts,
                            "Unable to persist cache after clearing old entries. Operating without persistence."
                        );
                        self.abandon(attempts, e.to_string());
                        return;
                    }
                }
                Err(e) => {
                    error!(attempt = attempts, error = %e, "Unexpected error persisting cache");
                    self.abandon(attempts, e.to_string());
                    return;
                }
            }
        }
    }

    #[instrument(skip(self), fields(key = %self.key))]
    async fn restore(&self) -> Option<PersistedSnapshot> {
        let raw = match self.storage.get_item(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!(error = %e, "Failed to restore cache");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!(error = %e, "Failed to restore cache, removing corrupted snapshot");
                if let Err(e) = self.storage.remove_item(&self.key).await {
                    debug!(error = %e, "Failed to remove corrupted snapshot");
                }
                self.emit(CacheEvent::Discarded {
                    storage_key: self.key.clone(),
                    reason: format!("corrupted: {}", e),
                });
                None
            }
        }
    }

    #[instrument(skip(self), fields(key = %self.key))]
    async fn remove(&self) {
        if let Err(e) = self.storage.remove_item(&self.key).await {
            error!(error = %e, "Failed to remove cache");
            return;
        }

        if let Err(e) = self.generations.forget(&self.key).await {
            warn!(error = %e, "Failed to update generation index");
        }
    }
}
