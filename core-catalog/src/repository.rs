//! Podcast repository trait and catalog-backed implementation

use crate::error::{CatalogError, Result};
use crate::fetcher::ResilientFetcher;
use crate::itunes::{
    EpisodeInfo, FeedEntry, LookupResponse, PodcastInfo, RecordKind, TopPodcastsResponse,
};
use crate::models::{Episode, Podcast, PodcastDetail};
use async_trait::async_trait;
use core_runtime::config::{
    CatalogEndpoints, HubConfig, EPISODES_LIMIT_PLACEHOLDER, PODCAST_ID_PLACEHOLDER,
};
use tracing::{debug, error, instrument, warn};

/// Read access to the podcast directory.
#[async_trait]
pub trait PodcastRepository: Send + Sync {
    /// Top podcasts, in upstream ranking order.
    ///
    /// # Errors
    /// Returns error if both fetch paths fail or the feed cannot be decoded
    async fn get_podcasts(&self) -> Result<Vec<Podcast>>;

    /// A podcast's metadata and its most recent episodes.
    ///
    /// # Errors
    /// Returns error if:
    /// - The lookup has no results (`NotFound`)
    /// - No record describes the podcast itself (`MissingPodcastInfo`)
    /// - Both fetch paths fail
    async fn get_podcast_detail(&self, podcast_id: &str) -> Result<PodcastDetail>;
}

/// Repository over the public catalog endpoints.
pub struct ApiPodcastRepository {
    fetcher: ResilientFetcher,
    endpoints: CatalogEndpoints,
    episodes_limit: usize,
}

impl ApiPodcastRepository {
    pub fn new(fetcher: ResilientFetcher, endpoints: CatalogEndpoints, episodes_limit: usize) -> Self {
        Self {
            fetcher,
            endpoints,
            episodes_limit,
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(
            ResilientFetcher::from_config(config),
            config.endpoints.clone(),
            config.episodes_limit,
        )
    }

    /// Lookup URL for `podcast_id`, percent-encoded into the template, asking
    /// for `episodes_limit` records.
    pub fn lookup_url(&self, podcast_id: &str) -> String {
        self.endpoints
            .podcast_lookup_template
            .replace(PODCAST_ID_PLACEHOLDER, &urlencoding::encode(podcast_id))
            .replace(EPISODES_LIMIT_PLACEHOLDER, &self.episodes_limit.to_string())
    }

    fn map_entry(entry: FeedEntry) -> Podcast {
        let image = entry
            .largest_image()
            .map(|image| image.label.clone())
            .unwrap_or_default();

        Podcast {
            id: entry.id.attributes.im_id,
            name: entry.name.label,
            artist: entry.artist.label,
            summary: entry.summary.label,
            image,
            track_count: None,
        }
    }

    fn map_episode(info: EpisodeInfo, podcast_id: &str) -> Episode {
        let description = non_empty(info.description)
            .or_else(|| non_empty(info.short_description))
            .unwrap_or_default();
        let audio_url = non_empty(info.preview_url)
            .or_else(|| non_empty(info.episode_url))
            .unwrap_or_default();
        let duration = info
            .track_time_millis
            .filter(|millis| millis.is_finite() && *millis > 0.0)
            .map(|millis| (millis / 1000.0).floor() as u64)
            .unwrap_or(0);
        let release_date = info
            .release_date
            .split('T')
            .next()
            .unwrap_or_default()
            .to_string();

        Episode {
            id: info.track_id.to_string(),
            title: info.track_name,
            description,
            release_date,
            duration,
            audio_url,
            podcast_id: podcast_id.to_string(),
        }
    }

    fn map_detail(&self, podcast_id: &str, response: LookupResponse) -> Result<PodcastDetail> {
        if response.results.is_empty() {
            return Err(CatalogError::NotFound {
                podcast_id: podcast_id.to_string(),
            });
        }

        let mut info: Option<PodcastInfo> = None;
        let mut episodes = Vec::new();

        for record in response.results {
            match RecordKind::of(&record) {
                RecordKind::Podcast if info.is_none() => {
                    let podcast = serde_json::from_value::<PodcastInfo>(record).map_err(|e| {
                        CatalogError::InvalidResponse {
                            service: "lookup",
                            message: e.to_string(),
                        }
                    })?;
                    info = Some(podcast);
                }
                RecordKind::Episode if episodes.len() < self.episodes_limit => {
                    match serde_json::from_value::<EpisodeInfo>(record) {
                        Ok(episode) => episodes.push(Self::map_episode(episode, podcast_id)),
                        Err(e) => {
                            warn!(podcast_id = %podcast_id, error = %e, "Skipping malformed episode record")
                        }
                    }
                }
                _ => {}
            }
        }

        let info = info.ok_or_else(|| CatalogError::MissingPodcastInfo {
            podcast_id: podcast_id.to_string(),
        })?;

        if info.collection_id.to_string() != podcast_id {
            warn!(
                podcast_id = %podcast_id,
                collection_id = info.collection_id,
                "Lookup returned a different podcast than requested"
            );
        }

        Ok(PodcastDetail {
            id: info.collection_id.to_string(),
            summary: info.collection_name.clone(),
            name: info.collection_name,
            artist: info.artist_name,
            image: info.artwork_url600.unwrap_or_default(),
            track_count: info.track_count,
            episodes,
        })
    }
}

#[async_trait]
impl PodcastRepository for ApiPodcastRepository {
    #[instrument(skip(self))]
    async fn get_podcasts(&self) -> Result<Vec<Podcast>> {
        let response: TopPodcastsResponse = self
            .fetcher
            .fetch_json(&self.endpoints.top_podcasts_url)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch podcasts");
                CatalogError::from(e)
            })?;

        let podcasts: Vec<Podcast> = response.feed.entry.into_iter().map(Self::map_entry).collect();
        debug!(count = podcasts.len(), "Fetched top podcasts");
        Ok(podcasts)
    }

    #[instrument(skip(self))]
    async fn get_podcast_detail(&self, podcast_id: &str) -> Result<PodcastDetail> {
        let url = self.lookup_url(podcast_id);

        let result = match self.fetcher.fetch_json::<LookupResponse>(&url).await {
            Ok(response) => self.map_detail(podcast_id, response),
            Err(e) => Err(CatalogError::from(e)),
        };

        match &result {
            Ok(detail) => debug!(episodes = detail.episodes.len(), "Fetched podcast detail"),
            Err(e) => error!(podcast_id = %podcast_id, error = %e, "Failed to fetch podcast detail for ID"),
        }

        result
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
