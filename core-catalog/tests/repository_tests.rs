//! Repository behaviour against recorded catalog responses

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use core_catalog::{
    ApiPodcastRepository, CatalogError, FetchFailure, PodcastRepository, ResilientFetcher,
};
use core_runtime::config::{CatalogEndpoints, FetchConfig};
use mockall::{mock, Sequence};
use serde_json::{json, Value};
use std::sync::Arc;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

const PROXY_BASE: &str = "https://api.allorigins.win/get?url=";

fn repository(mock: MockHttpClient) -> ApiPodcastRepository {
    let endpoints = CatalogEndpoints::default();
    let fetcher = ResilientFetcher::new(Arc::new(mock), PROXY_BASE, FetchConfig::default());
    ApiPodcastRepository::new(fetcher, endpoints, 20)
}

fn serving(body: Value) -> MockHttpClient {
    let body = body.to_string();
    let mut mock = MockHttpClient::new();
    mock.expect_execute()
        .withf(|request| !request.url.starts_with(PROXY_BASE))
        .returning(move |_| Ok(HttpResponse::new(200, body.clone())));
    mock
}

fn feed_entry(id: &str, name: &str, artist: &str) -> Value {
    json!({
        "im:name": { "label": name },
        "im:image": [
            { "label": format!("https://img/{}/55.png", id), "attributes": { "height": "55" } },
            { "label": format!("https://img/{}/60.png", id), "attributes": { "height": "60" } },
            { "label": format!("https://img/{}/170.png", id), "attributes": { "height": "170" } }
        ],
        "summary": { "label": format!("<p>About {}</p>", name) },
        "im:artist": { "label": artist },
        "id": { "label": format!("https://podcasts.apple.com/podcast/id{}", id), "attributes": { "im:id": id } }
    })
}

fn top_podcasts_feed() -> Value {
    json!({
        "feed": {
            "entry": [
                feed_entry("1535809341", "The Joe Budden Podcast", "The Joe Budden Network"),
                feed_entry("788236947", "Song Exploder", "Hrishikesh Hirway"),
                feed_entry("1574007634", "Broken Record", "Pushkin Industries")
            ]
        }
    })
}

fn lookup_response() -> Value {
    let episode = |id: u64, millis: u64, date: &str| {
        json!({
            "wrapperType": "podcastEpisode",
            "kind": "podcast-episode",
            "trackId": id,
            "trackName": format!("Episode {}", id),
            "description": "<b>Guest</b> interview",
            "releaseDate": date,
            "trackTimeMillis": millis,
            "episodeUrl": format!("https://cdn/{}.mp3", id),
            "collectionId": 1574007634u64
        })
    };

    json!({
        "resultCount": 4,
        "results": [
            {
                "wrapperType": "track",
                "kind": "podcast",
                "collectionId": 1574007634u64,
                "collectionName": "Broken Record",
                "artistName": "Pushkin Industries",
                "artworkUrl600": "https://img/1574007634/600.jpg",
                "trackCount": 412
            },
            episode(1000650000001, 2_546_999, "2024-01-15T08:00:00Z"),
            episode(1000650000002, 4_567_000, "2024-01-08T08:00:00Z"),
            episode(1000650000003, 999, "2024-01-01T08:00:00Z")
        ]
    })
}

#[tokio::test]
async fn test_get_podcasts_maps_feed_entries() {
    let repo = repository(serving(top_podcasts_feed()));
    let podcasts = repo.get_podcasts().await.unwrap();

    assert_eq!(podcasts.len(), 3);
    assert_eq!(podcasts[1].id, "788236947");
    assert_eq!(podcasts[1].name, "Song Exploder");
    assert_eq!(podcasts[1].artist, "Hrishikesh Hirway");
    assert_eq!(podcasts[1].summary, "<p>About Song Exploder</p>");
    for podcast in &podcasts {
        assert_eq!(podcast.image, format!("https://img/{}/170.png", podcast.id));
    }
}

#[tokio::test]
async fn test_get_podcasts_with_empty_feed() {
    let repo = repository(serving(json!({ "feed": {} })));
    assert!(repo.get_podcasts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_podcast_detail_maps_episodes() {
    let repo = repository(serving(lookup_response()));
    let detail = repo.get_podcast_detail("1574007634").await.unwrap();

    assert_eq!(detail.id, "1574007634");
    assert_eq!(detail.name, "Broken Record");
    assert_eq!(detail.artist, "Pushkin Industries");
    assert_eq!(detail.image, "https://img/1574007634/600.jpg");
    assert_eq!(detail.track_count, Some(412));
    assert_eq!(detail.episodes.len(), 3);

    let durations: Vec<u64> = detail.episodes.iter().map(|e| e.duration).collect();
    assert_eq!(durations, [2546, 4567, 0]);

    let first = &detail.episodes[0];
    assert_eq!(first.id, "1000650000001");
    assert_eq!(first.release_date, "2024-01-15");
    assert_eq!(first.podcast_id, "1574007634");
    assert_eq!(first.audio_url, "https://cdn/1000650000001.mp3");
    assert_eq!(first.description, "<b>Guest</b> interview");
}

#[tokio::test]
async fn test_empty_lookup_is_not_found() {
    let repo = repository(serving(json!({ "resultCount": 0, "results": [] })));
    let err = repo.get_podcast_detail("999").await.unwrap_err();

    assert!(err.is_not_found());
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("999"));
}

#[tokio::test]
async fn test_detail_through_proxy_after_direct_failure() {
    let mut seq = Sequence::new();
    let mut mock = MockHttpClient::new();
    mock.expect_execute()
        .withf(|request| request.url.starts_with("https://itunes.apple.com/lookup?id=1574007634"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(BridgeError::OperationFailed("CORS".to_string())));
    mock.expect_execute()
        .withf(|request| request.url.starts_with(PROXY_BASE))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            let envelope = json!({
                "contents": lookup_response().to_string(),
                "status": { "http_code": 200 }
            });
            Ok(HttpResponse::new(200, envelope.to_string()))
        });

    let detail = repository(mock)
        .get_podcast_detail("1574007634")
        .await
        .unwrap();
    assert_eq!(detail.episodes.len(), 3);
}

#[tokio::test]
async fn test_both_paths_failing_surfaces_fetch_error() {
    let mut mock = MockHttpClient::new();
    mock.expect_execute()
        .returning(|_| Ok(HttpResponse::new(503, "")));

    let err = repository(mock).get_podcasts().await.unwrap_err();
    match err {
        CatalogError::Fetch(fetch) => {
            assert_eq!(fetch.direct, FetchFailure::Status { status: 503 });
            assert_eq!(fetch.proxy, FetchFailure::Status { status: 503 });
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
