//! Domain models
//!
//! Serialized in camelCase so persisted snapshots keep the field names of
//! the catalog shapes (`audioUrl`, `releaseDate`, `trackCount`).

use serde::{Deserialize, Serialize};

/// A podcast as listed in the top podcasts feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Podcast {
    pub id: String,
    pub name: String,
    pub artist: String,
    /// HTML-bearing free text
    pub summary: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_count: Option<u32>,
}

/// A single episode of a podcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub title: String,
    /// HTML-bearing free text
    pub description: String,
    /// `YYYY-MM-DD`
    pub release_date: String,
    /// Whole seconds; zero when unknown
    pub duration: u64,
    /// Empty when no playable audio is available
    pub audio_url: String,
    pub podcast_id: String,
}

impl Episode {
    pub fn has_audio(&self) -> bool {
        !self.audio_url.is_empty()
    }
}

/// A podcast together with its episodes, in upstream order.
///
/// `track_count` is what the catalog reports for the whole podcast and is
/// usually larger than `episodes.len()`, which is capped by the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodcastDetail {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub summary: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_count: Option<u32>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl PodcastDetail {
    /// Looks up an episode by id.
    pub fn episode(&self, episode_id: &str) -> Option<&Episode> {
        self.episodes.iter().find(|episode| episode.id == episode_id)
    }

    /// The podcast part of the detail, without episodes.
    pub fn podcast(&self) -> Podcast {
        Podcast {
            id: self.id.clone(),
            name: self.name.clone(),
            artist: self.artist.clone(),
            summary: self.summary.clone(),
            image: self.image.clone(),
            track_count: self.track_count,
        }
    }
}
