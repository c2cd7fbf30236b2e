//! Single-tier cache and manager tests.

use availcache_test_utils::fixtures::{harness, FIXED_NOW};
use availcache_test_utils::{
    AvailCacheError, RunConfig, SimpleCache, SimpleCacheError, SimpleConfig, StorageError,
    StoreOp,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_simple_cache_stores_raw_value_with_minute_ttl() {
    let h = harness();
    let cache = SimpleCache::new(Arc::clone(&h.store));

    let value: Vec<u32> = cache
        .get("plain", || async { Ok::<_, String>(vec![1, 2]) }, &SimpleConfig::new(900), false)
        .await
        .unwrap();

    assert_eq!(value, vec![1, 2]);
    assert_eq!(h.store.puts(), vec![("plain".to_string(), json!([1, 2]), 15)]);
    assert!(h.store.ops().iter().all(|op| op.key() == "plain"));
}

#[tokio::test]
async fn test_simple_cache_hit_and_expiry() {
    let h = harness();
    let cache = SimpleCache::new(Arc::clone(&h.store));
    let config = SimpleConfig::default();
    let calls = &AtomicUsize::new(0);

    for _ in 0..3 {
        let value: u32 = cache
            .get(
                "k",
                move || async move { Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) as u32) },
                &config,
                false,
            )
            .await
            .unwrap();
        assert_eq!(value, 0);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    h.clock.advance(600);
    let value: u32 = cache
        .get(
            "k",
            move || async move { Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) as u32) },
            &config,
            false,
        )
        .await
        .unwrap();
    assert_eq!(value, 1);
}

#[tokio::test]
async fn test_simple_cache_has_no_lock_or_alarm_traffic() {
    let h = harness();
    let cache = SimpleCache::new(Arc::clone(&h.store));

    let err = cache
        .get::<u32, _, _, _>("k", || async { Err("boom") }, &SimpleConfig::default(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, SimpleCacheError::Producer("boom")));
    assert_eq!(
        h.store.ops(),
        vec![StoreOp::Get {
            key: "k".to_string(),
            found: false,
        }]
    );
}

#[tokio::test]
async fn test_simple_cache_surfaces_store_failure() {
    let h = harness();
    let cache = SimpleCache::new(Arc::clone(&h.store));
    h.store.fail_with(StorageError::TransactionFailed {
        reason: "write conflict".to_string(),
    });

    let err = cache
        .get::<u32, _, _, String>("k", || async { Ok(1) }, &SimpleConfig::default(), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SimpleCacheError::Cache(AvailCacheError::Storage(StorageError::TransactionFailed { .. }))
    ));
}

#[tokio::test]
async fn test_manager_routes_both_engines_through_one_store() {
    let h = harness();
    let manager = h.manager();

    let plain: String = manager
        .simple("k", || async { Ok::<_, String>("plain".to_string()) }, &SimpleConfig::default(), false)
        .await
        .unwrap();
    let tiered: Option<String> = manager
        .l2("k", || async { Ok::<_, String>("tiered".to_string()) }, &RunConfig::new(), false)
        .await
        .unwrap();

    assert_eq!(plain, "plain");
    assert_eq!(tiered.as_deref(), Some("tiered"));

    let keys: Vec<String> = h.store.puts().into_iter().map(|(key, _, _)| key).collect();
    assert_eq!(keys, vec!["k", "k_l1_cache", "k_l2_cache"]);
    assert_eq!(
        h.store.puts()[1].1,
        json!({"origin_data": "tiered", "expire_time": FIXED_NOW + 600})
    );
}
