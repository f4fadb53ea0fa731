//! # Podcast List Pipeline
//!
//! Pure derivation from the loaded podcasts to what a list view shows:
//!
//! ```text
//! all podcasts -> filter(search term) -> visible window
//! ```
//!
//! - [`filter`] - case-insensitive search over name and artist
//! - [`pagination`] - [`VisibleWindow`] and the infinite-scroll [`ScrollTrigger`]
//! - [`list`] - [`PodcastList`], which ties both to the reset rules
//!
//! Nothing here performs I/O.

pub mod error;
pub mod filter;
pub mod list;
pub mod pagination;

pub use error::{LibraryError, Result};
pub use filter::{filter_podcasts, SearchFilter, Searchable};
pub use list::PodcastList;
pub use pagination::{ScrollTrigger, VisibleWindow};
