//! Fetch Orchestrator Tests
//!
//! Single-flight, retry/backoff, stale fallback, and cache administration against
//! a counting stub upstream.

mod common;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use common::StubUpstream;
use futures::future::join_all;
use paddock::fetch::{
    CacheEntry, CacheTtl, DurableCache, FetchOptions, Fetcher, Fingerprint, KeyValueStore,
    MemoryStore, QueryParams, RequestQueue, Upstream,
};
use paddock::{PaddockError, Result};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn fetcher_over(upstream: Arc<dyn Upstream>, store: Arc<dyn KeyValueStore>) -> Fetcher {
    let cache = DurableCache::new(store, "openf1_cache_", CacheTtl::default());
    Fetcher::new(upstream, cache, RequestQueue::new(3), FetchOptions::default())
}

fn laps_params() -> QueryParams {
    QueryParams::new().with("session_key", 9158).with("driver_number", 1)
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_fetches_share_one_upstream_call() {
    common::init_tracing();
    let stub = Arc::new(StubUpstream::new());
    stub.route("/laps", json!([{ "lap_number": 1 }])).with_delay(Duration::from_millis(200));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let params = laps_params();
    let results = join_all((0..10).map(|_| fetcher.fetch_value("/laps", &params, None))).await;

    assert_eq!(stub.calls("/laps"), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
    }
    assert_eq!(fetcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn parameter_order_does_not_split_single_flight() {
    let stub = Arc::new(StubUpstream::new());
    stub.route("/laps", json!([])).with_delay(Duration::from_millis(50));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let forward = QueryParams::new().with("session_key", 9158).with("driver_number", 1);
    let reverse = QueryParams::new().with("driver_number", 1).with("session_key", 9158);
    let (a, b) = tokio::join!(
        fetcher.fetch_value("/laps", &forward, None),
        fetcher.fetch_value("/laps", &reverse, None),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(stub.calls("/laps"), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_a_failure() {
    let stub = Arc::new(StubUpstream::new());
    stub.fail_always("/laps", PaddockError::http_status(400, "/laps", "bad filter"))
        .with_delay(Duration::from_millis(50));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let params = laps_params();
    let results = join_all((0..4).map(|_| fetcher.fetch_value("/laps", &params, None))).await;

    assert_eq!(stub.calls("/laps"), 1);
    for result in results {
        assert!(matches!(result, Err(PaddockError::Http { status: 400, .. })));
    }
    assert_eq!(fetcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_exponential_backoff() {
    let stub = Arc::new(StubUpstream::new());
    stub.route("/laps", json!([{ "lap_number": 3 }]))
        .fail_times("/laps", 1, PaddockError::network("connection reset"));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let started = tokio::time::Instant::now();
    let payload = fetcher.fetch_value("/laps", &laps_params(), None).await.unwrap();

    assert_eq!(*payload, json!([{ "lap_number": 3 }]));
    assert_eq!(stub.calls("/laps"), 2);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1000), "waited {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2000), "waited {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_wait_one_then_two_seconds() {
    let stub = Arc::new(StubUpstream::new());
    stub.fail_always("/laps", PaddockError::http_status(503, "/laps", "maintenance"));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let started = tokio::time::Instant::now();
    let result = fetcher.fetch_value("/laps", &laps_params(), None).await;

    assert!(matches!(result, Err(PaddockError::Http { status: 503, .. })));
    assert_eq!(stub.calls("/laps"), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(3000), "waited {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(4000), "waited {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_not_retried() {
    let stub = Arc::new(StubUpstream::new());
    stub.fail_always("/laps", PaddockError::http_status(422, "/laps", "unprocessable"));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let result = fetcher.fetch_value("/laps", &laps_params(), None).await;

    assert!(matches!(result, Err(PaddockError::Http { status: 422, .. })));
    assert_eq!(stub.calls("/laps"), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_entry_backs_a_failed_refresh() {
    let stub = Arc::new(StubUpstream::new());
    stub.fail_always("/laps", PaddockError::network("offline"));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let params = laps_params();
    let stale = CacheEntry {
        payload: json!([{ "lap_number": 9 }]),
        stored_at: Utc::now() - TimeDelta::minutes(30),
    };
    fetcher.cache().put_entry(&Fingerprint::new("/laps", &params), &stale).await;

    let payload = fetcher.fetch_value("/laps", &params, None).await.unwrap();
    assert_eq!(*payload, json!([{ "lap_number": 9 }]));
    // Stale entries never short-circuit the network
    assert_eq!(stub.calls("/laps"), 3);

    let strict = FetchOptions { use_stale_on_error: false, ..FetchOptions::default() };
    let result = fetcher.fetch_value("/laps", &params, Some(strict)).await;
    assert!(matches!(result, Err(PaddockError::Network { .. })));
}

#[tokio::test(start_paused = true)]
async fn successful_refresh_replaces_stale_entry() {
    let stub = Arc::new(StubUpstream::new());
    stub.route("/laps", json!([{ "lap_number": 10 }]));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));

    let params = laps_params();
    let fingerprint = Fingerprint::new("/laps", &params);
    let stale = CacheEntry { payload: json!([]), stored_at: Utc::now() - TimeDelta::hours(2) };
    fetcher.cache().put_entry(&fingerprint, &stale).await;

    let payload = fetcher.fetch_value("/laps", &params, None).await.unwrap();
    assert_eq!(*payload, json!([{ "lap_number": 10 }]));

    let stored = fetcher.cache().get(&fingerprint).await.unwrap();
    assert_eq!(stored.payload, json!([{ "lap_number": 10 }]));
    assert!(stored.stored_at > stale.stored_at);
}

#[tokio::test]
async fn durable_entries_are_shared_across_fetchers() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let stub = Arc::new(StubUpstream::new());
    stub.route("/meetings", json!([{ "meeting_key": 1229, "meeting_name": "Singapore" }]));

    let params = QueryParams::new().with("year", 2024);
    let first = fetcher_over(stub.clone(), Arc::clone(&store));
    first.fetch_value("/meetings", &params, None).await.unwrap();

    // A restarted process sees the same store
    let second = fetcher_over(stub.clone(), Arc::clone(&store));
    let payload = second.fetch_value("/meetings", &params, None).await.unwrap();

    assert_eq!(payload[0]["meeting_name"], "Singapore");
    assert_eq!(stub.calls("/meetings"), 1);
}

/// Store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(PaddockError::cache("get_item", "disk unavailable"))
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Err(PaddockError::cache("set_item", "disk full"))
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        Err(PaddockError::cache("get_all_keys", "disk unavailable"))
    }

    async fn multi_remove(&self, _keys: &[String]) -> Result<()> {
        Err(PaddockError::cache("multi_remove", "disk unavailable"))
    }
}

#[tokio::test]
async fn cache_failures_never_fail_a_fetch() {
    let stub = Arc::new(StubUpstream::new());
    stub.route("/drivers", json!([{ "driver_number": 1 }]));
    let fetcher = fetcher_over(stub.clone(), Arc::new(BrokenStore));

    let params = QueryParams::new().with("session_key", 9158);
    for _ in 0..2 {
        let payload = fetcher.fetch_value("/drivers", &params, None).await.unwrap();
        assert_eq!(payload[0]["driver_number"], 1);
    }
    // Nothing could be cached, so both calls went upstream
    assert_eq!(stub.calls("/drivers"), 2);
    assert_eq!(fetcher.clear_cache().await, 0);
}

#[tokio::test]
async fn clearing_one_endpoint_keeps_the_others() {
    let stub = Arc::new(StubUpstream::new());
    stub.route("/laps", json!([])).route("/stints", json!([]));
    let fetcher = fetcher_over(stub.clone(), Arc::new(MemoryStore::new()));
    let params = QueryParams::new().with("session_key", 9158);

    fetcher.fetch_value("/laps", &params, None).await.unwrap();
    fetcher.fetch_value("/stints", &params, None).await.unwrap();

    assert_eq!(fetcher.clear_cache_for_endpoint("/laps").await, 1);

    fetcher.fetch_value("/laps", &params, None).await.unwrap();
    fetcher.fetch_value("/stints", &params, None).await.unwrap();
    assert_eq!(stub.calls("/laps"), 2);
    assert_eq!(stub.calls("/stints"), 1);

    assert_eq!(fetcher.clear_cache().await, 2);
}

/// Upstream that records the highest number of overlapping calls.
#[derive(Default)]
struct ConcurrencyGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Upstream for ConcurrencyGauge {
    async fn get(&self, _path: &str, _params: &QueryParams) -> Result<Value> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(json!([]))
    }
}

#[tokio::test(start_paused = true)]
async fn queue_caps_concurrent_upstream_calls() {
    let gauge = Arc::new(ConcurrencyGauge::default());
    let fetcher = fetcher_over(gauge.clone(), Arc::new(MemoryStore::new()));

    let params: Vec<QueryParams> =
        (0..8).map(|driver| QueryParams::new().with("driver_number", driver)).collect();
    let results =
        join_all(params.iter().map(|params| fetcher.fetch_value("/laps", params, None))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
    assert_eq!(fetcher.queue().available_permits(), 3);
}

#[tokio::test(start_paused = true)]
async fn abandoned_fetch_still_completes_and_frees_the_queue() {
    let stub = Arc::new(StubUpstream::new());
    stub.route("/laps", json!([{ "lap_number": 1 }])).with_delay(Duration::from_millis(500));
    let store = Arc::new(MemoryStore::new());
    let cache = DurableCache::new(store, "openf1_cache_", CacheTtl::default());
    let fetcher = Fetcher::new(stub.clone(), cache, RequestQueue::new(1), FetchOptions::default());

    let params = laps_params();
    let pending = fetcher.fetch_value("/laps", &params, None);
    let abandoned = tokio::time::timeout(Duration::from_millis(100), pending).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fetcher.in_flight(), 0);
    assert_eq!(fetcher.queue().available_permits(), 1);

    let other = QueryParams::new().with("session_key", 9158).with("driver_number", 44);
    let unrelated =
        tokio::time::timeout(Duration::from_secs(60), fetcher.fetch_value("/laps", &other, None))
            .await;
    assert!(matches!(unrelated, Ok(Ok(_))));

    // The abandoned request finished and was cached
    fetcher.fetch_value("/laps", &params, None).await.unwrap();
    assert_eq!(stub.calls("/laps"), 2);
}

#[tokio::test]
async fn typed_fetch_decodes_rows() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Row {
        driver_number: u32,
    }

    let stub = Arc::new(StubUpstream::new());
    stub.route("/drivers", json!([{ "driver_number": 44, "team_name": "Mercedes" }]));
    let fetcher = fetcher_over(stub, Arc::new(MemoryStore::new()));

    let rows: Vec<Row> = fetcher.fetch("/drivers", &QueryParams::new(), None).await.unwrap();
    assert_eq!(rows, vec![Row { driver_number: 44 }]);

    let wrong: Result<Vec<String>> = fetcher.fetch("/drivers", &QueryParams::new(), None).await;
    assert!(matches!(wrong, Err(PaddockError::Decode { .. })));
}
