// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests for the query service
//!
//! Each test wires the service to fake stores and sources from `helpers` and
//! checks which path answered the query and what was left in the cache.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use emissions_cache::store::{KeyValueStore, MemoryStore};
use emissions_cache::{
    cancellation, CacheEntry, EmissionsCacheConfig, EmissionsCacheConfigBuilder, EmissionsQueryService,
    EmissionsRow, ErrorKind, KeyDeriver, OverlapPolicy, QueryError, QueryRequest, RequestContext,
    Resolution, StoreError,
};
use helpers::{record, CountingSource, FailingStore, GatedStore, StoreOp};

fn service_with(
    store: Arc<dyn KeyValueStore>,
    source: Arc<CountingSource>,
    config: EmissionsCacheConfig,
) -> EmissionsQueryService {
    EmissionsQueryService::new(store, source, config)
}

fn request(start: &str, end: &str, facilities: &[&str]) -> QueryRequest {
    QueryRequest::new(start, end, facilities.iter().copied())
}

/// Write `results` directly under the exact key for the given query
async fn seed(store: &dyn KeyValueStore, start: &str, end: &str, facilities: &[&str], results: Vec<EmissionsRow>) {
    let query = request(start, end, facilities).validate().unwrap();
    let key = KeyDeriver::default().derive(&query).unwrap();
    let entry = CacheEntry::for_query(&query, results);
    store.set(key.as_str(), entry.encode().unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_computes_from_dataset_on_empty_cache() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::new(vec![
        record("2023-01-05", "A", 10.0),
        record("2023-02-10", "A", 20.0),
        record("2023-03-02", "A", 99.0),
        record("2023-01-20", "B", 7.0),
    ]));
    let service = service_with(store.clone(), source.clone(), EmissionsCacheConfig::default());

    let outcome = service
        .query_with_context(
            &RequestContext::new(),
            &request("2023-01-01", "2023-03-01", &["A"]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.results, vec![EmissionsRow::new("A", 30.0)]);
    assert_eq!(outcome.resolution, Resolution::Computed);
    assert_eq!(
        outcome.key.as_str(),
        "emissions:288f297a51eb63ae2892f7df62d3f2dbf35afedf04e512e8f27b0acb80db88c0"
    );
    assert_eq!(source.selects(), 1);

    // The computed answer is stored under the exact key
    let stored = store.get(outcome.key.as_str()).await.unwrap().unwrap();
    let entry = CacheEntry::decode(outcome.key.as_str(), &stored).unwrap();
    assert_eq!(entry.results, outcome.results);
    assert_eq!(entry.start_date.to_string(), "2023-01-01");
    assert_eq!(entry.end_date.to_string(), "2023-03-01");
}

#[tokio::test]
async fn test_overlapping_entry_is_reused() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::new(vec![
        record("2023-01-20", "A", 10.0),
        record("2023-02-10", "A", 20.0),
    ]));
    let service = service_with(store.clone(), source.clone(), EmissionsCacheConfig::default());
    let ctx = RequestContext::new();

    let january = service
        .query_with_context(&ctx, &request("2023-01-01", "2023-01-31", &["A"]))
        .await
        .unwrap();
    assert_eq!(january.results, vec![EmissionsRow::new("A", 10.0)]);

    let outcome = service
        .query_with_context(&ctx, &request("2023-01-15", "2023-02-15", &["A"]))
        .await
        .unwrap();

    assert_eq!(
        outcome.resolution,
        Resolution::Overlap {
            fragments: vec![january.key.clone()],
            skipped: 0,
        }
    );
    // Only the cached fragment contributes; the dataset is not consulted
    assert_eq!(outcome.results, vec![EmissionsRow::new("A", 10.0)]);
    assert_eq!(source.selects(), 1);

    let repeat = service
        .query_with_context(&ctx, &request("2023-01-15", "2023-02-15", &["A"]))
        .await
        .unwrap();
    assert_eq!(repeat.resolution, Resolution::ExactHit);
}

#[tokio::test]
async fn test_disjoint_facilities_fall_back_to_dataset() {
    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref(), "2023-01-01", "2023-01-31", &["A"], vec![EmissionsRow::new("A", 10.0)]).await;
    seed(store.as_ref(), "2023-01-10", "2023-03-31", &["A"], vec![EmissionsRow::new("A", 50.0)]).await;

    let source = Arc::new(CountingSource::new(vec![
        record("2023-01-12", "B", 4.0),
        record("2023-01-13", "A", 1000.0),
    ]));
    let service = service_with(store, source.clone(), EmissionsCacheConfig::default());

    let outcome = service
        .query_with_context(
            &RequestContext::new(),
            &request("2023-01-01", "2023-01-31", &["B"]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::Computed);
    assert_eq!(outcome.results, vec![EmissionsRow::new("B", 4.0)]);
    assert_eq!(source.selects(), 1);
}

#[tokio::test]
async fn test_corrupt_entry_does_not_fail_scan() {
    let store = Arc::new(MemoryStore::new());
    let facilities = ["A"];
    for (start, end, total) in [
        ("2023-01-01", "2023-01-31", 1.0),
        ("2023-02-01", "2023-02-28", 2.0),
        ("2023-03-01", "2023-03-31", 4.0),
        ("2023-04-01", "2023-04-30", 8.0),
    ] {
        seed(store.as_ref(), start, end, &facilities, vec![EmissionsRow::new("A", total)]).await;
    }
    store
        .set("emissions:0000corrupt", b"\x00 definitely not json".to_vec())
        .await
        .unwrap();

    let source = Arc::new(CountingSource::new(vec![]));
    let service = service_with(store, source.clone(), EmissionsCacheConfig::default());

    let outcome = service
        .query_with_context(
            &RequestContext::new(),
            &request("2023-01-15", "2023-04-15", &facilities),
        )
        .await
        .unwrap();

    match &outcome.resolution {
        Resolution::Overlap { fragments, skipped } => {
            assert_eq!(fragments.len(), 4);
            assert_eq!(*skipped, 1);
        }
        other => panic!("expected overlap resolution, got {other:?}"),
    }
    assert_eq!(outcome.results, vec![EmissionsRow::new("A", 15.0)]);
    assert_eq!(source.selects(), 0);
}

#[tokio::test]
async fn test_repeated_query_is_byte_identical() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::new(vec![
        record("2023-01-02", "GreenEat Changi", 0.1),
        record("2023-01-03", "GreenEat Changi", 0.2),
        record("2023-01-04", "GreenEat Orchard", 1.0 / 3.0),
    ]));
    let service = service_with(store, source.clone(), EmissionsCacheConfig::default());
    let req = request("2023-01-01", "2023-06-30", &["GreenEat Orchard", "GreenEat Changi"]);
    let ctx = RequestContext::new();

    let first = service.query_with_context(&ctx, &req).await.unwrap();
    let second = service.query_with_context(&ctx, &req).await.unwrap();

    assert_eq!(first.resolution, Resolution::Computed);
    assert_eq!(second.resolution, Resolution::ExactHit);
    assert_eq!(
        serde_json::to_vec(&first.results).unwrap(),
        serde_json::to_vec(&second.results).unwrap()
    );
    for (a, b) in first.results.iter().zip(&second.results) {
        assert_eq!(a.total_emissions.to_bits(), b.total_emissions.to_bits());
    }
    assert_eq!(source.selects(), 1);
}

#[tokio::test]
async fn test_exact_hit_returns_stored_rows_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let stored = vec![
        EmissionsRow::new("B", 1.0),
        EmissionsRow::new("A", 2.0),
        EmissionsRow::new("B", 3.0),
    ];
    seed(store.as_ref(), "2023-01-01", "2023-01-31", &["A", "B"], stored.clone()).await;

    let source = Arc::new(CountingSource::new(vec![]));
    let service = service_with(store.clone(), source, EmissionsCacheConfig::default());

    let outcome = service
        .query_with_context(
            &RequestContext::new(),
            &request("2023-01-01", "2023-01-31", &["B", "A"]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::ExactHit);
    assert_eq!(outcome.results, stored);
    assert_eq!(store.stats().await.writes, 1);
}

#[tokio::test]
async fn test_corrupt_exact_entry_is_recomputed_and_overwritten() {
    let store = Arc::new(MemoryStore::new());
    let query = request("2023-01-01", "2023-01-31", &["A"]);
    let key = KeyDeriver::default().derive(&query.validate().unwrap()).unwrap();
    store.set(key.as_str(), b"{\"start_date\":".to_vec()).await.unwrap();

    let source = Arc::new(CountingSource::new(vec![record("2023-01-09", "A", 3.5)]));
    let service = service_with(store, source.clone(), EmissionsCacheConfig::default());
    let ctx = RequestContext::new();

    let first = service.query_with_context(&ctx, &query).await.unwrap();
    assert_eq!(first.resolution, Resolution::Computed);
    assert_eq!(first.results, vec![EmissionsRow::new("A", 3.5)]);

    let second = service.query_with_context(&ctx, &query).await.unwrap();
    assert_eq!(second.resolution, Resolution::ExactHit);
    assert_eq!(source.selects(), 1);
}

#[tokio::test]
async fn test_store_failure_on_lookup_is_not_a_miss() {
    let store = Arc::new(FailingStore::new().failing_on(StoreOp::Get));
    let source = Arc::new(CountingSource::new(vec![record("2023-01-09", "A", 3.5)]));
    let service = service_with(store, source.clone(), EmissionsCacheConfig::default());

    let err = service
        .query(&request("2023-01-01", "2023-01-31", &["A"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(err.is_retryable());
    assert_eq!(source.selects(), 0);
}

#[tokio::test]
async fn test_store_failure_during_scan_does_not_fall_back() {
    let store = Arc::new(FailingStore::new().failing_on(StoreOp::Scan));
    let source = Arc::new(CountingSource::new(vec![record("2023-01-09", "A", 3.5)]));
    let service = service_with(store.clone(), source.clone(), EmissionsCacheConfig::default());

    let err = service
        .query(&request("2023-01-01", "2023-01-31", &["A"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        QueryError::StoreUnavailable(StoreError::Unavailable { operation: "scan_keys", .. })
    ));
    assert_eq!(source.selects(), 0);
    assert_eq!(store.stats().await.writes, 0);
}

#[tokio::test]
async fn test_store_failure_on_persist_is_reported() {
    let store = Arc::new(FailingStore::new().failing_on(StoreOp::Set));
    let source = Arc::new(CountingSource::new(vec![record("2023-01-09", "A", 3.5)]));
    let service = service_with(store, source.clone(), EmissionsCacheConfig::default());

    let err = service
        .query(&request("2023-01-01", "2023-01-31", &["A"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert_eq!(source.selects(), 1);
}

#[tokio::test]
async fn test_invalid_request_never_touches_store() {
    let store = Arc::new(FailingStore::new());
    let source = Arc::new(CountingSource::new(vec![]));
    let service = service_with(store.clone(), source.clone(), EmissionsCacheConfig::default());

    let missing: QueryRequest = serde_json::from_str(r#"{"endDate": "2023-01-31"}"#).unwrap();
    let inverted = request("2023-02-01", "2023-01-01", &["A"]);
    let garbled = request("2023-13-45", "2023-12-31", &["A"]);

    for bad in [missing, inverted, garbled] {
        let err = service.query(&bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.is_client_error());
    }

    assert_eq!(store.calls(), 0);
    assert_eq!(source.selects(), 0);
}

#[tokio::test]
async fn test_dataset_failure_is_reported_and_not_cached() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::unavailable());
    let service = service_with(store.clone(), source, EmissionsCacheConfig::default());

    let err = service
        .query(&request("2023-01-01", "2023-01-31", &["A"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DatasetCompute);
    assert_eq!(store.stats().await.writes, 0);
}

#[tokio::test]
async fn test_empty_facilities_yield_empty_result() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::new(vec![record("2023-01-09", "A", 3.5)]));
    let service = service_with(store.clone(), source.clone(), EmissionsCacheConfig::default());

    let outcome = service
        .query_with_context(
            &RequestContext::new(),
            &request("2023-01-01", "2023-01-31", &[]),
        )
        .await
        .unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.resolution, Resolution::Computed);
    assert_eq!(source.selects(), 0);
    assert_eq!(store.stats().await.writes, 1);
}

#[tokio::test]
async fn test_cancel_during_scan_discards_partial_rows() {
    let (handle, signal) = cancellation();
    // get #1 is the exact lookup, get #2 is the first scanned entry
    let store = Arc::new(GatedStore::new().cancel_on_get(2, handle));
    seed(store.inner(), "2023-01-01", "2023-01-31", &["A"], vec![EmissionsRow::new("A", 1.0)]).await;
    seed(store.inner(), "2023-02-01", "2023-02-28", &["A"], vec![EmissionsRow::new("A", 2.0)]).await;

    let source = Arc::new(CountingSource::new(vec![record("2023-01-09", "A", 3.5)]));
    let config = EmissionsCacheConfigBuilder::with_defaults()
        .scan_concurrency(1)
        .build();
    let service = service_with(store.clone(), source.clone(), config);

    let ctx = RequestContext::new().with_cancellation(signal);
    let err = service
        .query_with_context(&ctx, &request("2023-01-15", "2023-02-15", &["A"]))
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::Cancelled { stage: "scan" }));
    assert_eq!(source.selects(), 0);
    assert_eq!(store.stats().await.writes, 2);
}

#[tokio::test]
async fn test_cancelled_request_does_no_work() {
    let (handle, signal) = cancellation();
    handle.cancel();

    let store = Arc::new(FailingStore::new());
    let source = Arc::new(CountingSource::new(vec![]));
    let service = service_with(store.clone(), source.clone(), EmissionsCacheConfig::default());

    let err = service
        .query_with_context(
            &RequestContext::new().with_cancellation(signal),
            &request("2023-01-01", "2023-01-31", &["A"]),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!err.is_retryable());
    assert_eq!(store.calls(), 0);
    assert_eq!(source.selects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let store = Arc::new(GatedStore::new().with_get_delay(Duration::from_secs(60)));
    let source = Arc::new(CountingSource::new(vec![]));
    let config = EmissionsCacheConfigBuilder::with_defaults()
        .store_timeout(Duration::from_millis(100))
        .build();
    let service = service_with(store, source.clone(), config);

    let err = service
        .query(&request("2023-01-01", "2023-01-31", &["A"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        QueryError::StoreUnavailable(StoreError::Timeout { operation: "get", .. })
    ));
    assert!(err.is_retryable());
    assert_eq!(source.selects(), 0);
}

#[tokio::test]
async fn test_facility_clipped_policy_drops_foreign_rows() {
    let mut answers = Vec::new();
    for policy in [OverlapPolicy::Coarse, OverlapPolicy::FacilityClipped] {
        let store = Arc::new(MemoryStore::new());
        seed(
            store.as_ref(),
            "2023-01-01",
            "2023-01-31",
            &["A", "B"],
            vec![EmissionsRow::new("A", 10.0), EmissionsRow::new("B", 5.0)],
        )
        .await;
        let source = Arc::new(CountingSource::new(vec![]));
        let config = EmissionsCacheConfigBuilder::with_defaults()
            .overlap_policy(policy)
            .build();
        let service = service_with(store, source.clone(), config);

        let rows = service
            .query(&request("2023-01-10", "2023-01-20", &["A"]))
            .await
            .unwrap();
        assert_eq!(source.selects(), 0);
        answers.push(rows);
    }

    assert_eq!(
        answers[0],
        vec![EmissionsRow::new("A", 10.0), EmissionsRow::new("B", 5.0)]
    );
    assert_eq!(answers[1], vec![EmissionsRow::new("A", 10.0)]);
}

#[tokio::test]
async fn test_disabled_policy_skips_scan() {
    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref(), "2023-01-01", "2023-01-31", &["A"], vec![EmissionsRow::new("A", 10.0)]).await;

    let source = Arc::new(CountingSource::new(vec![
        record("2023-01-20", "A", 1.0),
        record("2023-02-10", "A", 2.0),
    ]));
    let service = service_with(store.clone(), source.clone(), EmissionsCacheConfig::minimal());

    let outcome = service
        .query_with_context(
            &RequestContext::new(),
            &request("2023-01-15", "2023-02-15", &["A"]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::Computed);
    assert_eq!(outcome.results, vec![EmissionsRow::new("A", 3.0)]);
    assert_eq!(store.stats().await.scans, 0);
    assert_eq!(source.selects(), 1);
}

#[tokio::test]
async fn test_namespaces_do_not_share_entries() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::new(vec![record("2023-01-20", "A", 1.0)]));

    let scope1 = service_with(
        store.clone(),
        source.clone(),
        EmissionsCacheConfigBuilder::with_defaults().namespace("scope1").build(),
    );
    let scope2 = service_with(
        store.clone(),
        source.clone(),
        EmissionsCacheConfigBuilder::with_defaults().namespace("scope2").build(),
    );
    let req = request("2023-01-01", "2023-01-31", &["A"]);
    let ctx = RequestContext::new();

    let first = scope1.query_with_context(&ctx, &req).await.unwrap();
    let second = scope2.query_with_context(&ctx, &req).await.unwrap();

    assert!(first.key.as_str().starts_with("scope1:"));
    assert!(second.key.as_str().starts_with("scope2:"));
    assert_eq!(first.key.digest(), second.key.digest());
    assert_eq!(second.resolution, Resolution::Computed);
    assert_eq!(source.selects(), 2);
}

#[tokio::test]
async fn test_concurrent_identical_queries_agree() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::new(vec![
        record("2023-01-20", "A", 1.5),
        record("2023-01-21", "B", 2.5),
    ]));
    let service = Arc::new(service_with(
        store.clone(),
        source,
        EmissionsCacheConfig::default(),
    ));
    let req = request("2023-01-01", "2023-01-31", &["A", "B"]);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let req = req.clone();
            tokio::spawn(async move { service.query(&req).await })
        })
        .collect();

    for task in tasks {
        let rows = task.await.unwrap().unwrap();
        assert_eq!(
            rows,
            vec![EmissionsRow::new("A", 1.5), EmissionsRow::new("B", 2.5)]
        );
    }
    assert_eq!(store.stats().await.entries, 1);
}
