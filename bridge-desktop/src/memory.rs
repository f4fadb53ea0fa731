//! In-memory key-value storage

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{KeyValueStore, StorageUsage},
};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Volatile key-value store
///
/// Behaves like [`SqliteKeyValueStore`](crate::SqliteKeyValueStore),
/// quota handling included, without touching disk. Contents are lost when
/// the store is dropped.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    items: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total stored bytes
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().await;

        if let Some(quota) = self.quota_bytes {
            let requested = (key.len() + value.len()) as u64;
            let others: u64 = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();

            if others + requested > quota {
                return Err(BridgeError::QuotaExceeded {
                    key: key.to_string(),
                    requested_bytes: requested,
                    quota_bytes: quota,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.lock().await.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.items.lock().await.clear();
        Ok(())
    }

    async fn usage(&self) -> Result<StorageUsage> {
        let items = self.items.lock().await;
        Ok(StorageUsage {
            total_bytes: items
                .iter()
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum(),
            key_count: items.len(),
        })
    }
}
