//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `core-query`, `core-catalog`).
//! Host applications can depend on `podcast-hub-workspace` and enable the
//! documented features without needing to wire each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "sqlite-cache"))]
pub use core_service::{PodcastHub, PodcastHubBuilder};

#[cfg(feature = "sqlite-cache")]
pub use core_service::open_sqlite_cache;
