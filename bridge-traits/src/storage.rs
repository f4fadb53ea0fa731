//! Key-Value Storage Abstraction
//!
//! Provides a platform-agnostic string key/value store with the semantics of
//! a browser `localStorage`: values are strings, writes are whole-value
//! replacements, and the backend may refuse a write once its quota is spent.

use async_trait::async_trait;

use crate::error::Result;

/// Approximate storage usage, measured as key plus value byte lengths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub key_count: usize,
}

/// Key-value storage trait
///
/// Abstracts persistent string storage:
/// - Desktop: SQLite-backed table
/// - Tests: in-memory map
/// - Web: `window.localStorage`
///
/// # Quota
///
/// Backends with a size limit must fail `set_item` with
/// [`BridgeError::QuotaExceeded`](crate::error::BridgeError::QuotaExceeded)
/// when the write would exceed it. The previous value under the key is left
/// untouched in that case.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn remember(store: &dyn KeyValueStore) -> Result<()> {
///     store.set_item("last_search", "tech").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value, `Ok(None)` if the key doesn't exist
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting a missing key is not an error
    async fn remove_item(&self, key: &str) -> Result<()>;

    /// List all keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Clear all values
    async fn clear(&self) -> Result<()>;

    /// Estimate current usage
    async fn usage(&self) -> Result<StorageUsage> {
        let keys = self.keys().await?;
        let mut usage = StorageUsage {
            total_bytes: 0,
            key_count: keys.len(),
        };

        for key in keys {
            if let Some(value) = self.get_item(&key).await? {
                usage.total_bytes += (key.len() + value.len()) as u64;
            }
        }

        Ok(usage)
    }
}
