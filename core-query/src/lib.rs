//! # Query Cache
//!
//! Keyed, deduplicated, TTL-bounded cache of async results.
//!
//! - [`key`] - hierarchical [`QueryKey`]s such as `podcast/detail/42`
//! - [`options`] - per-read [`QueryOptions`] and the [`RetryPolicy`]
//! - [`state`] - [`QueryState`], what a reader sees: data, error and
//!   loading flags
//! - [`client`] - [`QueryClient`], which owns the entries, runs fetches and
//!   persists snapshots through `core-cache`
//!
//! Data is stored as JSON values so the whole cache can be dehydrated into
//! one snapshot regardless of the types callers read it as.

pub mod client;
pub mod error;
pub mod key;
pub mod options;
pub mod state;

pub use client::{QueryClient, QueryClientBuilder};
pub use error::{QueryError, Result};
pub use key::QueryKey;
pub use options::{QueryOptions, RetryPolicy, StalePolicy};
pub use state::QueryState;
