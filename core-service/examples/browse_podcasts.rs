//! # Podcast Browsing Example
//!
//! Lists the top podcasts, filters them by an optional search term and shows
//! the latest episodes of the first match. The query cache is kept in a
//! SQLite file when the `sqlite-cache` feature is on, so a second run starts
//! from the restored snapshot.
//!
//! Run with: `cargo run --example browse_podcasts --package core-service -- history`

use bridge_traits::time::LogLevel;
use core_catalog::format_duration;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{HubConfig, PodcastHub};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_level(LogLevel::Info))?;

    let search_term = std::env::args().nth(1).unwrap_or_default();

    #[allow(unused_mut)]
    let mut builder = HubConfig::builder();
    #[cfg(feature = "sqlite-cache")]
    {
        let store = core_service::open_sqlite_cache("podcast-cache.db".into()).await?;
        builder = builder.storage(store);
    }

    let hub = PodcastHub::start(builder.build()?).await;

    let mut list = hub.podcast_list().await?;
    list.set_search_term(search_term.as_str());
    println!(
        "Showing {} of {} podcasts matching {:?}",
        list.podcast_count(),
        list.total_filtered_count(),
        search_term
    );
    for podcast in list.visible() {
        println!("  {:>12}  {} by {}", podcast.id, podcast.name, podcast.artist);
    }

    if let Some(first) = list.visible().first() {
        let detail = hub.podcast_detail(&first.id).await.into_result()?;
        if let Some(detail) = detail {
            println!("\n{} ({} episodes)", detail.name, detail.episodes.len());
            for episode in detail.episodes.iter().take(5) {
                println!(
                    "  {}  {:>8}  {}",
                    episode.release_date,
                    format_duration(episode.duration),
                    episode.title
                );
            }
        }
    }

    hub.shutdown().await;
    Ok(())
}
