//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the podcast core and the host
//! environment. The core never talks to the network or to persistent storage
//! directly; it goes through the capabilities below so that the same fetch and
//! cache logic runs against a desktop adapter, an in-memory test double, or a
//! browser-backed store.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Catalog GET requests with per-request deadlines
//! - [`KeyValueStore`](storage::KeyValueStore) - String key/value storage with quota semantics
//!   (the equivalent of a browser `localStorage`)
//! - [`Clock`](time::Clock) - Time source for freshness checks and deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Storage
//! adapters must report a full store as [`BridgeError::QuotaExceeded`] rather
//! than a generic failure, because the cache persister recovers from that
//! condition and gives up on every other one.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks. Implementations must ensure thread safety.
//!
//! ## Example
//!
//! A host that already has a settings table only needs the string contract:
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::{error::Result, KeyValueStore};
//!
//! struct HostPrefs(/* platform handle */);
//!
//! #[async_trait]
//! impl KeyValueStore for HostPrefs {
//!     async fn get_item(&self, key: &str) -> Result<Option<String>> { /* ... */ }
//!     async fn set_item(&self, key: &str, value: &str) -> Result<()> { /* ... */ }
//!     async fn remove_item(&self, key: &str) -> Result<()> { /* ... */ }
//!     async fn keys(&self) -> Result<Vec<String>> { /* ... */ }
//!     async fn clear(&self) -> Result<()> { /* ... */ }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use storage::{KeyValueStore, StorageUsage};
pub use time::{Clock, LogLevel, ManualClock, SystemClock};
