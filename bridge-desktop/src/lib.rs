//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `KeyValueStore` backed by a SQLite table, with an optional byte quota
//!   mirroring the limit a browser puts on `localStorage`
//! - `KeyValueStore` held in memory, for tests and ephemeral sessions
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteKeyValueStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let store = SqliteKeyValueStore::new("cache/podcasts.db".into()).await?;
//!
//!     // Use in hub configuration
//!     Ok(())
//! }
//! ```

mod http;
mod key_value;
mod memory;

pub use http::ReqwestHttpClient;
pub use key_value::SqliteKeyValueStore;
pub use memory::MemoryKeyValueStore;
