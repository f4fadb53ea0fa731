//! Snapshot generations
//!
//! Every storage key a persister has written a snapshot under is a
//! *generation*. Generations are tracked in a bounded LRU whose contents are
//! saved under a dedicated index key, so quota recovery knows exactly which
//! keys belong to the cache without scanning the whole store.
//!
//! Eviction policy:
//!
//! - Recording a write when the registry is full evicts the least recently
//!   written generation and removes its key from storage.
//! - Quota recovery removes every other generation except the most recently
//!   written one. The generation being written is never touched.
//!
//! A lone [`StoragePersister`](crate::StoragePersister) writes one fixed key,
//! so its registry holds a single generation and quota recovery frees
//! nothing. Space is only reclaimed when several persisters share a registry
//! through [`StoragePersister::with_generations`](crate::StoragePersister::with_generations),
//! e.g. one per storage key on a shared store.

use crate::error::{CacheError, Result};
use bridge_traits::KeyValueStore;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_GENERATION_INDEX_KEY: &str = "PODCASTER_CACHE::generations";

/// A storage key holding a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub key: String,
    pub bytes: u64,
    /// Unix millis of the last successful write
    pub written_at: i64,
}

struct Registry {
    entries: LruCache<String, Generation>,
    loaded: bool,
}

pub struct SnapshotGenerations {
    storage: Arc<dyn KeyValueStore>,
    index_key: String,
    registry: Mutex<Registry>,
}

impl SnapshotGenerations {
    pub fn new(storage: Arc<dyn KeyValueStore>, capacity: NonZeroUsize) -> Self {
        Self {
            storage,
            index_key: DEFAULT_GENERATION_INDEX_KEY.to_string(),
            registry: Mutex::new(Registry {
                entries: LruCache::new(capacity),
                loaded: false,
            }),
        }
    }

    pub fn with_index_key(mut self, index_key: impl Into<String>) -> Self {
        self.index_key = index_key.into();
        self
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Known generations, least recently written first.
    pub async fn generations(&self) -> Vec<Generation> {
        let mut registry = self.registry.lock().await;
        self.load(&mut registry).await;
        Self::oldest_first(&registry)
    }

    /// Records a successful write of `generation.key`.
    ///
    /// Returns the keys evicted to stay within capacity.
    pub async fn record(&self, generation: Generation) -> Result<Vec<String>> {
        let mut registry = self.registry.lock().await;
        self.load(&mut registry).await;

        let key = generation.key.clone();
        let mut evicted = Vec::new();

        if let Some((old_key, _)) = registry.entries.push(key.clone(), generation) {
            if old_key != key {
                self.remove_key(&old_key).await;
                info!(evicted = %old_key, "Evicted oldest snapshot generation");
                evicted.push(old_key);
            }
        }

        self.save(&registry).await?;
        Ok(evicted)
    }

    /// Frees space for a write to `keep` that hit the storage quota.
    ///
    /// Returns the keys removed from storage.
    pub async fn prune_for_quota(&self, keep: &str) -> Result<Vec<String>> {
        let mut registry = self.registry.lock().await;
        self.load(&mut registry).await;

        let doomed: Vec<String> = registry
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .filter(|key| key != keep)
            .skip(1)
            .collect();

        for key in &doomed {
            registry.entries.pop(key);
            self.remove_key(key).await;
        }

        if !doomed.is_empty() {
            info!(removed = doomed.len(), keep = %keep, "Pruned snapshot generations");
            self.save(&registry).await?;
        }

        Ok(doomed)
    }

    /// Drops `key` from the registry without touching its value.
    pub async fn forget(&self, key: &str) -> Result<()> {
        let mut registry = self.registry.lock().await;
        self.load(&mut registry).await;

        if registry.entries.pop(key).is_some() {
            self.save(&registry).await?;
        }
        Ok(())
    }

    async fn load(&self, registry: &mut Registry) {
        if registry.loaded {
            return;
        }
        registry.loaded = true;

        match self.read_index().await {
            Ok(generations) => {
                debug!(count = generations.len(), "Loaded snapshot generation index");
                for generation in generations {
                    registry.entries.push(generation.key.clone(), generation);
                }
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable generation index");
                self.remove_key(&self.index_key).await;
            }
        }
    }

    async fn read_index(&self) -> Result<Vec<Generation>> {
        let Some(raw) = self.storage.get_item(&self.index_key).await? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&raw).map_err(|e| CacheError::CorruptedIndex {
            key: self.index_key.clone(),
            message: e.to_string(),
        })
    }

    async fn save(&self, registry: &Registry) -> Result<()> {
        let generations = Self::oldest_first(registry);
        let serialized = serde_json::to_string(&generations)?;
        self.storage.set_item(&self.index_key, &serialized).await?;
        Ok(())
    }

    async fn remove_key(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key).await {
            warn!(key = %key, error = %e, "Failed to remove snapshot generation");
        }
    }

    fn oldest_first(registry: &Registry) -> Vec<Generation> {
        registry
            .entries
            .iter()
            .rev()
            .map(|(_, generation)| generation.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemoryKeyValueStore;

    fn generation(key: &str, written_at: i64) -> Generation {
        Generation {
            key: key.to_string(),
            bytes: 10,
            written_at,
        }
    }

    async fn seeded(store: &Arc<MemoryKeyValueStore>, keys: &[&str]) {
        for key in keys {
            store.set_item(key, "{}").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_record_evicts_least_recent_when_full() {
        let store = Arc::new(MemoryKeyValueStore::new());
        seeded(&store, &["a", "b", "c"]).await;
        let registry = SnapshotGenerations::new(store.clone(), NonZeroUsize::new(2).unwrap());

        assert!(registry.record(generation("a", 1)).await.unwrap().is_empty());
        assert!(registry.record(generation("b", 2)).await.unwrap().is_empty());
        // Rewriting "a" makes "b" the least recent
        registry.record(generation("a", 3)).await.unwrap();
        let evicted = registry.record(generation("c", 4)).await.unwrap();

        assert_eq!(evicted, ["b"]);
        assert_eq!(store.get_item("b").await.unwrap(), None);
        let keys: Vec<String> = registry.generations().await.into_iter().map(|g| g.key).collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[tokio::test]
    async fn test_prune_keeps_current_and_most_recent_other() {
        let store = Arc::new(MemoryKeyValueStore::new());
        seeded(&store, &["old", "older", "oldest", "current"]).await;
        let registry = SnapshotGenerations::new(store.clone(), NonZeroUsize::new(4).unwrap());

        registry.record(generation("oldest", 1)).await.unwrap();
        registry.record(generation("older", 2)).await.unwrap();
        registry.record(generation("current", 3)).await.unwrap();
        registry.record(generation("old", 4)).await.unwrap();

        let mut removed = registry.prune_for_quota("current").await.unwrap();
        removed.sort();
        assert_eq!(removed, ["older", "oldest"]);
        assert!(store.get_item("old").await.unwrap().is_some());
        assert!(store.get_item("current").await.unwrap().is_some());

        // Nothing left to free on a second pass
        assert!(registry.prune_for_quota("current").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_generation_has_nothing_to_prune() {
        let store = Arc::new(MemoryKeyValueStore::new());
        seeded(&store, &["PODCASTER_CACHE"]).await;
        let registry = SnapshotGenerations::new(store.clone(), NonZeroUsize::new(4).unwrap());

        registry.record(generation("PODCASTER_CACHE", 1)).await.unwrap();
        registry.record(generation("PODCASTER_CACHE", 2)).await.unwrap();

        assert!(registry.prune_for_quota("PODCASTER_CACHE").await.unwrap().is_empty());
        assert!(store.get_item("PODCASTER_CACHE").await.unwrap().is_some());
        assert_eq!(registry.generations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_index_survives_reload() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let capacity = NonZeroUsize::new(4).unwrap();

        let first = SnapshotGenerations::new(store.clone(), capacity);
        first.record(generation("x", 1)).await.unwrap();
        first.record(generation("y", 2)).await.unwrap();

        let second = SnapshotGenerations::new(store.clone(), capacity);
        assert_eq!(
            second.generations().await,
            vec![generation("x", 1), generation("y", 2)]
        );

        second.forget("x").await.unwrap();
        let third = SnapshotGenerations::new(store, capacity);
        assert_eq!(third.generations().await, vec![generation("y", 2)]);
    }

    #[tokio::test]
    async fn test_corrupted_index_is_discarded() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set_item(DEFAULT_GENERATION_INDEX_KEY, "not json")
            .await
            .unwrap();

        let registry = SnapshotGenerations::new(store.clone(), NonZeroUsize::new(2).unwrap());
        assert!(registry.generations().await.is_empty());
        assert_eq!(store.get_item(DEFAULT_GENERATION_INDEX_KEY).await.unwrap(), None);
    }
}
