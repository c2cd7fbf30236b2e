//! Property-Based Tests for the Two-Tier Cache
//!
//! **Property 1: Regeneration writes both tiers**
//! For any key, value and valid config, a cold `get` runs the producer once,
//! writes the primary then the safety-net record with `now + interval`
//! deadlines and minute TTLs, and returns the produced value.
//!
//! **Property 2: Lock release**
//! Whatever the producer does, the generation lock is gone afterwards.
//!
//! **Property 3: Fast path**
//! A fresh primary record is returned without running the producer.
//!
//! **Property 4: Configuration validation**
//! An invalid config fails before any store access.

use availcache_test_utils::fixtures::{generate_lock_held, harness_at, seed_record};
use availcache_test_utils::generators::{
    arb_base_key, arb_invalid_run_config, arb_json_value, arb_unix_time, arb_valid_run_config,
};
use availcache_test_utils::{ttl_minutes, AvailCacheError, DerivedKeys, LookupSource};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn cache_failure(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(format!("cache call failed: {}", e))
}

fn expected_deadline(now: i64, interval: u64) -> i64 {
    if interval == 0 {
        0
    } else {
        now + interval as i64
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 1: Regeneration writes both tiers**
    #[test]
    fn prop_cold_get_writes_both_tiers(
        key in arb_base_key(),
        value in arb_json_value(),
        config in arb_valid_run_config(),
        now in arb_unix_time(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = harness_at(now);
            let keys = DerivedKeys::new(&key);
            let calls = &AtomicUsize::new(0);
            let produced = value.clone();

            let lookup = h
                .cache
                .resolve(
                    &key,
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(produced)
                    },
                    &config,
                    false,
                )
                .await
                .map_err(cache_failure)?;

            prop_assert_eq!(lookup.source(), LookupSource::Regenerated);
            prop_assert_eq!(lookup.value(), Some(&value));
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);

            let puts = h.store.puts();
            prop_assert_eq!(puts.len(), 2);
            prop_assert_eq!(
                &puts[0],
                &(
                    keys.l1().to_string(),
                    json!({
                        "origin_data": value,
                        "expire_time": expected_deadline(now, config.l1_expire_interval),
                    }),
                    ttl_minutes(config.l1_expire_interval),
                )
            );
            prop_assert_eq!(
                &puts[1],
                &(
                    keys.l2().to_string(),
                    json!({
                        "origin_data": value,
                        "expire_time": expected_deadline(now, config.l2_expire_interval),
                    }),
                    ttl_minutes(config.l2_expire_interval),
                )
            );

            let held = generate_lock_held(&*h.store, &key).await.map_err(cache_failure)?;
            prop_assert!(!held);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// **Property 2: Lock release**
    #[test]
    fn prop_lock_released_after_producer_failure(
        key in arb_base_key(),
        reason in "[a-z ]{1,32}",
        config in arb_valid_run_config(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = harness_at(1_700_000_000);
            let failure = &reason;

            let lookup = h
                .cache
                .resolve::<Value, _, _, _>(
                    &key,
                    move || async move { Err(failure.clone()) },
                    &config,
                    false,
                )
                .await
                .map_err(cache_failure)?;

            prop_assert_eq!(lookup.source(), LookupSource::Absent);
            prop_assert!(h.store.puts().is_empty());
            let errors = h.logger.errors();
            prop_assert_eq!(errors.len(), 1);
            prop_assert_eq!(&errors[0].message, &reason);

            let held = generate_lock_held(&*h.store, &key).await.map_err(cache_failure)?;
            prop_assert!(!held);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// **Property 3: Fast path**
    #[test]
    fn prop_fresh_primary_is_served_without_producer(
        key in arb_base_key(),
        value in arb_json_value(),
        config in arb_valid_run_config(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = harness_at(1_700_000_000);
            let keys = DerivedKeys::new(&key);
            seed_record(&*h.store, keys.l1(), value.clone(), 1_700_000_600)
                .await
                .map_err(cache_failure)?;

            let calls = &AtomicUsize::new(0);
            let served = h
                .cache
                .get(
                    &key,
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(Value::Null)
                    },
                    &config,
                    false,
                )
                .await
                .map_err(cache_failure)?;

            prop_assert_eq!(served, Some(value));
            prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// **Property 4: Configuration validation**
    #[test]
    fn prop_invalid_config_fails_before_store_access(
        key in arb_base_key(),
        config in arb_invalid_run_config(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = harness_at(1_700_000_000);

            let result = h
                .cache
                .get(&key, || async { Ok::<_, String>(1u8) }, &config, false)
                .await;

            prop_assert!(matches!(result, Err(AvailCacheError::Config(_))));
            prop_assert!(h.store.ops().is_empty());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
