//! Concurrency, cancellation and persistence behaviour of the query client

use bridge_desktop::MemoryKeyValueStore;
use bridge_traits::{KeyValueStore, ManualClock};
use core_cache::{Persister, StoragePersister};
use core_query::{QueryClient, QueryKey, QueryOptions, QueryState, RetryPolicy, StalePolicy};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, QueryEvent};
use core_runtime::LoadingTracker;
use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

fn no_delay(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::ZERO, Duration::ZERO)
}

async fn wait_for_fetch(rx: &mut broadcast::Receiver<CoreEvent>) -> QueryEvent {
    loop {
        match rx.recv().await.expect("event bus closed") {
            CoreEvent::Query(event @ QueryEvent::FetchSucceeded { .. })
            | CoreEvent::Query(event @ QueryEvent::FetchFailed { .. }) => return event,
            _ => continue,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_reads_share_one_fetch() {
    let client = QueryClient::builder().build();
    let calls = Arc::new(AtomicU32::new(0));

    let read = |client: QueryClient| {
        let calls = Arc::clone(&calls);
        async move {
            client
                .query(QueryKey::podcasts(), QueryOptions::new(), move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, io::Error>(vec!["a".to_string(), "b".to_string()])
                    }
                })
                .await
        }
    };

    let (first, second, third) = tokio::join!(
        read(client.clone()),
        read(client.clone()),
        read(client.clone())
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for state in [first, second, third] {
        assert_eq!(state.data.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
    }
}

#[tokio::test]
async fn test_stale_data_is_served_while_refetching() {
    let clock = Arc::new(ManualClock::default());
    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let client = QueryClient::builder()
        .clock(clock.clone())
        .stale_time(Duration::from_secs(60))
        .events(events)
        .build();

    client.set_query_data(&QueryKey::podcasts(), &1u32).await.unwrap();
    clock.advance(Duration::from_secs(61));

    let state = client
        .query(QueryKey::podcasts(), QueryOptions::new(), || async {
            Ok::<_, io::Error>(2u32)
        })
        .await;

    assert_eq!(state.data, Some(1));
    assert!(state.is_fetching);
    assert!(!state.is_loading);

    assert!(matches!(wait_for_fetch(&mut rx).await, QueryEvent::FetchSucceeded { .. }));
    assert_eq!(client.get_query_data::<u32>(&QueryKey::podcasts()).await, Some(2));
}

#[tokio::test]
async fn test_cancelled_reader_still_populates_cache() {
    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let client = QueryClient::builder().events(events).build();
    let gate = Arc::new(Notify::new());
    let token = CancellationToken::new();

    let fetch_gate = Arc::clone(&gate);
    let reader = tokio::spawn({
        let client = client.clone();
        let token = token.clone();
        async move {
            client
                .query_with_cancel(
                    QueryKey::podcast_detail("42"),
                    QueryOptions::new(),
                    token,
                    move || {
                        let gate = Arc::clone(&fetch_gate);
                        async move {
                            gate.notified().await;
                            Ok::<_, io::Error>("detail".to_string())
                        }
                    },
                )
                .await
        }
    });

    token.cancel();
    let state: QueryState<String> = reader.await.unwrap();
    assert!(state.error.as_ref().is_some_and(|e| e.is_cancelled()));
    assert!(state.data.is_none());

    gate.notify_one();
    assert!(matches!(wait_for_fetch(&mut rx).await, QueryEvent::FetchSucceeded { .. }));
    assert_eq!(
        client
            .get_query_data::<String>(&QueryKey::podcast_detail("42"))
            .await
            .as_deref(),
        Some("detail")
    );
}

#[tokio::test]
async fn test_blocking_fetch_holds_loading_flag() {
    let loading = LoadingTracker::new();
    let client = QueryClient::builder().loading(loading.clone()).build();
    let gate = Arc::new(Notify::new());
    let mut loading_rx = loading.subscribe();

    let fetch_gate = Arc::clone(&gate);
    let reader = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .query(QueryKey::podcasts(), QueryOptions::new(), move || {
                    let gate = Arc::clone(&fetch_gate);
                    async move {
                        gate.notified().await;
                        Ok::<_, io::Error>(3u32)
                    }
                })
                .await
        }
    });

    loading_rx.wait_for(|loading| *loading).await.unwrap();
    let pending: QueryState<u32> = client.state(&QueryKey::podcasts()).await;
    assert!(pending.is_loading);

    gate.notify_one();
    assert_eq!(reader.await.unwrap().data, Some(3));
    loading_rx.wait_for(|loading| !*loading).await.unwrap();
    assert_eq!(loading.active(), 0);
}

#[tokio::test]
async fn test_retry_predicate_stops_on_permanent_errors() {
    let client = QueryClient::builder().query_retry(no_delay(2)).build();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let retry = no_delay(2).retry_if(|e| {
        e.downcast_ref::<io::Error>()
            .map_or(true, |e| e.kind() != io::ErrorKind::NotFound)
    });
    let state: QueryState<u32> = client
        .query(
            QueryKey::podcast_detail("missing"),
            QueryOptions::new().retry(retry),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(io::Error::new(io::ErrorKind::NotFound, "no such podcast")) }
            },
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let error = state.error.unwrap();
    assert_eq!(error.attempts(), 1);
    assert_eq!(
        error.downcast_ref::<io::Error>().map(io::Error::kind),
        Some(io::ErrorKind::NotFound)
    );
}

#[tokio::test]
async fn test_mutation_retries_then_invalidates() {
    let client = QueryClient::builder()
        .query_retry(no_delay(0))
        .mutation_retry(no_delay(1))
        .build();
    client.set_query_data(&QueryKey::podcasts(), &1u32).await.unwrap();

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let saved = client
        .run_mutation(QueryKey::new(["favourite"]), &[QueryKey::podcasts()], || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(io::Error::new(io::ErrorKind::Interrupted, "flaky"))
                } else {
                    Ok("saved")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(saved, "saved");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    let state = client
        .query(
            QueryKey::podcasts(),
            QueryOptions::new().stale_policy(StalePolicy::Blocking),
            || async { Ok::<_, io::Error>(2u32) },
        )
        .await;
    assert_eq!(state.data, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_changes_are_persisted_once_per_debounce() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let persister = Arc::new(
        StoragePersister::new(
            Arc::clone(&store),
            "PODCASTER_CACHE",
            3,
            NonZeroUsize::new(4).unwrap(),
        )
        .with_events(events),
    );
    let client = QueryClient::builder()
        .clock(Arc::new(ManualClock::default()))
        .persister(persister.clone(), "0.1.0", Duration::from_secs(1))
        .build();

    client.set_query_data(&QueryKey::podcasts(), &vec![1u32, 2]).await.unwrap();
    client
        .set_query_data(&QueryKey::podcast_detail("1"), &"one")
        .await
        .unwrap();
    assert_eq!(store.get_item("PODCASTER_CACHE").await.unwrap(), None);

    tokio::time::sleep(Duration::from_secs(2)).await;

    match rx.recv().await.unwrap() {
        CoreEvent::Cache(CacheEvent::Persisted { attempts, .. }) => assert_eq!(attempts, 1),
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(rx.try_recv().is_err());

    let snapshot = persister.restore().await.unwrap();
    assert_eq!(snapshot.buster, "0.1.0");
    assert_eq!(snapshot.client_state.queries.len(), 2);

    let restored = QueryClient::builder().build();
    assert_eq!(restored.hydrate(snapshot.client_state).await, 2);
    assert_eq!(
        restored.get_query_data::<Vec<u32>>(&QueryKey::podcasts()).await,
        Some(vec![1, 2])
    );
}
