//! # Podcast Catalog
//!
//! Everything that knows about the upstream podcast directory:
//!
//! - [`models`] - `Podcast`, `Episode` and `PodcastDetail`, the shapes the
//!   rest of the workspace works with
//! - [`fetcher`] - direct-then-relay JSON fetching with classified failures
//! - [`itunes`] - wire types of the top-podcasts feed and the lookup endpoint
//! - [`repository`] - maps wire types into models
//! - [`format`] - display helpers for episode metadata
//!
//! No other crate parses upstream JSON; a change in the directory's response
//! shape is contained here.

pub mod error;
pub mod fetcher;
pub mod format;
pub mod itunes;
pub mod models;
pub mod repository;

pub use error::{CatalogError, FetchError, FetchFailure, FetchPath, Result};
pub use fetcher::ResilientFetcher;
pub use format::{format_duration, format_duration_secs};
pub use models::{Episode, Podcast, PodcastDetail};
pub use repository::{ApiPodcastRepository, PodcastRepository};
