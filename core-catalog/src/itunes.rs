//! Upstream wire types
//!
//! Two endpoints are consumed:
//!
//! - the top podcasts RSS-as-JSON feed, `{ feed: { entry: [...] } }`
//! - the lookup endpoint, `{ resultCount, results: [...] }`, whose results mix
//!   podcast-info and episode records in one list
//!
//! The upstream is untrusted, so every scalar field defaults when absent and
//! lookup records are classified by their declared `wrapperType`/`kind` pair
//! rather than by position.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ============================================================================
// Top podcasts feed
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TopPodcastsResponse {
    pub feed: Feed,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Feed {
    /// A feed with a single entry serializes it as an object, not an array
    #[serde(default, deserialize_with = "one_or_many")]
    pub entry: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryId {
    #[serde(default)]
    pub attributes: EntryIdAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryIdAttributes {
    #[serde(rename = "im:id", default)]
    pub im_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageAttributes {
    #[serde(default)]
    pub height: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedImage {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub attributes: Option<ImageAttributes>,
}

impl FeedImage {
    /// Declared height in pixels, if it parses.
    pub fn declared_height(&self) -> Option<u32> {
        self.attributes
            .as_ref()
            .and_then(|attributes| attributes.height.trim().parse().ok())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub id: EntryId,
    #[serde(rename = "im:name", default)]
    pub name: Label,
    #[serde(rename = "im:artist", default)]
    pub artist: Label,
    #[serde(default)]
    pub summary: Label,
    #[serde(rename = "im:image", default)]
    pub images: Vec<FeedImage>,
}

impl FeedEntry {
    /// Largest image by declared height.
    ///
    /// The feed lists three sizes, smallest first. When no height parses
    /// the third variant is used, or the last one if fewer are listed.
    pub fn largest_image(&self) -> Option<&FeedImage> {
        let by_height = self
            .images
            .iter()
            .filter_map(|image| image.declared_height().map(|height| (height, image)))
            .max_by_key(|(height, _)| *height)
            .map(|(_, image)| image);

        by_height.or_else(|| self.images.get(2).or_else(|| self.images.last()))
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<FeedEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<FeedEntry>),
        One(Box<FeedEntry>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(entries) => entries,
        OneOrMany::One(entry) => vec![*entry],
    })
}

// ============================================================================
// Lookup endpoint
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    #[serde(default)]
    pub result_count: Option<u64>,
    /// Kept untyped until each record has been classified
    #[serde(default)]
    pub results: Vec<Value>,
}

/// Podcast-level record (`wrapperType: "track"`, `kind: "podcast"`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodcastInfo {
    #[serde(default)]
    pub collection_id: u64,
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub artwork_url600: Option<String>,
    #[serde(default)]
    pub track_count: Option<u32>,
}

/// Episode record (`wrapperType: "podcastEpisode"`, `kind: "podcast-episode"`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeInfo {
    #[serde(default)]
    pub track_id: u64,
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    /// ISO timestamp, e.g. `2024-01-15T08:00:00Z`
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub track_time_millis: Option<f64>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub episode_url: Option<String>,
}

/// Record kind, from the declared type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Podcast,
    Episode,
    Other,
}

impl RecordKind {
    pub fn of(record: &Value) -> Self {
        let wrapper_type = record.get("wrapperType").and_then(Value::as_str);
        let kind = record.get("kind").and_then(Value::as_str);

        match (wrapper_type, kind) {
            (Some("track"), Some("podcast")) => RecordKind::Podcast,
            (Some("podcastEpisode"), Some("podcast-episode")) => RecordKind::Episode,
            _ => RecordKind::Other,
        }
    }
}
