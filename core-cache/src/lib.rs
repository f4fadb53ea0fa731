//! # Persistent Query Cache
//!
//! Persists the query cache as a single JSON snapshot in a host
//! [`KeyValueStore`](bridge_traits::KeyValueStore) and restores it on the
//! next start.
//!
//! ## Overview
//!
//! - [`snapshot`] - the persisted document: timestamp, buster and the
//!   dehydrated queries
//! - [`persister`] - [`StoragePersister`], which writes with bounded retries
//!   on quota exhaustion and treats unreadable snapshots as absent
//! - [`generations`] - bounded LRU of the storage keys holding snapshots,
//!   used to free space when the store is full
//!
//! Persistence is best-effort. No operation here returns an error to its
//! caller; the application runs without a persisted cache instead.

pub mod error;
pub mod generations;
pub mod persister;
pub mod snapshot;

pub use error::{CacheError, Result};
pub use generations::{Generation, SnapshotGenerations};
pub use persister::{Persister, StoragePersister};
pub use snapshot::{DehydratedQuery, DehydratedState, DiscardReason, PersistedSnapshot};
