//! Podcast hub façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges (HTTP, key-value storage, clock)
//! into the catalog, query cache and list pipeline. Desktop hosts enable the
//! `desktop-shims` feature, which lets [`HubConfig`] fall back to
//! `bridge-desktop` implementations; `sqlite-cache` adds a file-backed store
//! for the persisted cache.
//!
//! ```ignore
//! use core_runtime::config::HubConfig;
//! use core_service::PodcastHub;
//!
//! # async fn example() -> core_service::Result<()> {
//! let hub = PodcastHub::start(HubConfig::builder().build()?).await;
//! let mut list = hub.podcast_list().await?;
//! list.set_search_term("history");
//! for podcast in list.visible() {
//!     println!("{} by {}", podcast.name, podcast.artist);
//! }
//! hub.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hub;

pub use error::{CoreError, Result};
pub use hub::{PodcastHub, PodcastHubBuilder};

pub use core_runtime::config::HubConfig;

#[cfg(feature = "sqlite-cache")]
use bridge_traits::KeyValueStore;
#[cfg(feature = "sqlite-cache")]
use std::{path::PathBuf, sync::Arc};

/// Opens (creating if needed) a SQLite file to hold the persisted cache.
///
/// Pass the result to `HubConfigBuilder::storage`.
#[cfg(feature = "sqlite-cache")]
pub async fn open_sqlite_cache(path: PathBuf) -> Result<Arc<dyn KeyValueStore>> {
    let store = bridge_desktop::SqliteKeyValueStore::new(path).await?;
    Ok(Arc::new(store))
}
