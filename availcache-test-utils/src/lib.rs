//! AvailCache Test Utilities
//!
//! Shared test infrastructure for the AvailCache workspace:
//! - Recording doubles for the store, the logger and the alarm hook
//! - A manually driven clock
//! - Proptest generators for run configurations, keys and values
//! - Fixtures and custom assertions for cache scenarios

// Re-export core types for convenience
pub use availcache_core::{
    ttl_minutes, AlarmCallback, AvailCacheError, AvailCacheResult, BoxError, Clock, ConfigError,
    FixedClock, RunConfig, SimpleConfig, StorageError, SystemClock, Timestamp,
    ALARM_LOCK_INTERVAL, L2_EXPIRE_INTERVAL_REMAIN_INTERVAL, MIN_L1_AND_L2_EXPIRE_INTERVAL_DIFF,
};

// Re-export engines and stores
pub use availcache_storage::{
    AvailableCache, AvailableCacheManager, CacheLogger, CacheStore, DerivedKeys, InMemoryStore,
    Lookup, LookupSource, SimpleCache, SimpleCacheError, StoreResult, NEAR_EXPIRY_ALARM_MESSAGE,
};

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Level;

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(unix_secs: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(unix_secs)),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, unix_secs: i64) {
        self.now.store(unix_secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        DateTime::from_timestamp(self.unix_timestamp(), 0).unwrap_or_default()
    }

    fn unix_timestamp(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// RECORDING STORE
// ============================================================================

/// One store call as observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Get {
        key: String,
        found: bool,
    },
    Add {
        key: String,
        value: Value,
        ttl_minutes: u64,
        created: bool,
    },
    Put {
        key: String,
        value: Value,
        ttl_minutes: u64,
    },
    Forget {
        key: String,
        existed: bool,
    },
}

impl StoreOp {
    pub fn key(&self) -> &str {
        match self {
            StoreOp::Get { key, .. }
            | StoreOp::Add { key, .. }
            | StoreOp::Put { key, .. }
            | StoreOp::Forget { key, .. } => key,
        }
    }
}

/// In-memory store that logs every successful call and can be told to fail.
#[derive(Debug)]
pub struct RecordingStore {
    inner: InMemoryStore,
    ops: Mutex<Vec<StoreOp>>,
    failure: Mutex<Option<StorageError>>,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryStore::with_clock(clock),
            ops: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// The wrapped store; reads through it are not recorded.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    /// Make every following call fail with `error`.
    pub fn fail_with(&self, error: StorageError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear_ops(&self) {
        self.ops
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Every recorded `put` as `(key, value, ttl_minutes)`.
    pub fn puts(&self) -> Vec<(String, Value, u64)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Put {
                    key,
                    value,
                    ttl_minutes,
                } => Some((key, value, ttl_minutes)),
                _ => None,
            })
            .collect()
    }

    /// Recorded calls touching `key`.
    pub fn ops_for(&self, key: &str) -> Vec<StoreOp> {
        self.ops().into_iter().filter(|op| op.key() == key).collect()
    }

    fn check(&self) -> StoreResult<()> {
        match &*self.failure.lock().map_err(|_| StorageError::LockPoisoned)? {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn record(&self, op: StoreOp) -> StoreResult<()> {
        self.ops
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .push(op);
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.check()?;
        let value = self.inner.get(key).await?;
        self.record(StoreOp::Get {
            key: key.to_string(),
            found: value.is_some(),
        })?;
        Ok(value)
    }

    async fn add(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<bool> {
        self.check()?;
        let created = self.inner.add(key, value.clone(), ttl_minutes).await?;
        self.record(StoreOp::Add {
            key: key.to_string(),
            value,
            ttl_minutes,
            created,
        })?;
        Ok(created)
    }

    async fn put(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<()> {
        self.check()?;
        self.inner.put(key, value.clone(), ttl_minutes).await?;
        self.record(StoreOp::Put {
            key: key.to_string(),
            value,
            ttl_minutes,
        })
    }

    async fn forget(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        let existed = self.inner.forget(key).await?;
        self.record(StoreOp::Forget {
            key: key.to_string(),
            existed,
        })?;
        Ok(existed)
    }
}

// ============================================================================
// RECORDING LOGGER AND ALARMS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub context: Value,
}

/// Logger that keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .collect()
    }

    pub fn errors(&self) -> Vec<LogRecord> {
        self.at_level(Level::ERROR)
    }

    /// Names of the probe events seen so far, in order.
    pub fn probe_events(&self) -> Vec<String> {
        self.at_level(Level::DEBUG)
            .into_iter()
            .map(|record| record.message)
            .collect()
    }
}

impl CacheLogger for RecordingLogger {
    fn log(&self, level: Level, message: &str, context: &Value) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                message: message.to_string(),
                context: context.clone(),
            });
        }
    }
}

/// Collects alarm messages and hands out callbacks that feed it.
#[derive(Debug, Clone, Default)]
pub struct AlarmRecorder {
    sent: Arc<Mutex<Vec<String>>>,
}

impl AlarmRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that records the message and succeeds.
    pub fn callback(&self) -> AlarmCallback {
        let sink = Arc::clone(&self.sent);
        AlarmCallback::new(move |message| {
            sink.lock()
                .map_err(|_| "alarm recorder poisoned")?
                .push(message.to_string());
            Ok(())
        })
    }

    /// Callback that records the message, then fails with `reason`.
    pub fn failing_callback(&self, reason: &str) -> AlarmCallback {
        let sink = Arc::clone(&self.sent);
        let reason = reason.to_string();
        AlarmCallback::new(move |message| {
            sink.lock()
                .map_err(|_| "alarm recorder poisoned")?
                .push(message.to_string());
            Err(reason.clone().into())
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate a plain base key.
    pub fn arb_base_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_:]{0,31}".prop_map(|s| s)
    }

    /// Generate a JSON value that survives a store round-trip unchanged.
    pub fn arb_json_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,24}".prop_map(Value::from),
            prop::collection::vec(any::<u32>(), 0..5).prop_map(|items| json!(items)),
            ("[a-z]{1,8}", any::<i32>()).prop_map(|(name, n)| json!({ "name": name, "n": n })),
        ]
    }

    /// Generate a run config whose tiers respect the minimum gap.
    pub fn arb_valid_run_config() -> impl Strategy<Value = RunConfig> {
        (0u64..86_400, 0u64..200_000, 60u64..1_200).prop_map(|(l1, extra, lock)| {
            RunConfig::new()
                .with_l1_expire_interval(l1)
                .with_l2_expire_interval(l1 + MIN_L1_AND_L2_EXPIRE_INTERVAL_DIFF + extra)
                .with_cache_lock_interval(lock)
        })
    }

    /// Generate a run config whose safety-net tier is too short.
    pub fn arb_invalid_run_config() -> impl Strategy<Value = RunConfig> {
        (0u64..86_400)
            .prop_flat_map(|l1| (Just(l1), 0..l1 + MIN_L1_AND_L2_EXPIRE_INTERVAL_DIFF))
            .prop_map(|(l1, l2)| {
                RunConfig::new()
                    .with_l1_expire_interval(l1)
                    .with_l2_expire_interval(l2)
            })
    }

    /// Generate a Unix timestamp within 2020-2030.
    pub fn arb_unix_time() -> impl Strategy<Value = i64> {
        1_577_836_800i64..1_893_456_000i64
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built cache setups for scenario tests.

    use super::*;

    /// Instant every fixture starts at.
    pub const FIXED_NOW: i64 = 1_700_000_000;

    /// A two-tier cache wired to recording doubles and a manual clock.
    pub struct CacheHarness {
        pub cache: AvailableCache<RecordingStore>,
        pub store: Arc<RecordingStore>,
        pub logger: Arc<RecordingLogger>,
        pub clock: ManualClock,
    }

    impl CacheHarness {
        pub fn manager(&self) -> AvailableCacheManager<RecordingStore> {
            AvailableCacheManager::new(Arc::clone(&self.store), self.logger.clone())
                .with_clock(Arc::new(self.clock.clone()))
        }
    }

    pub fn harness() -> CacheHarness {
        harness_at(FIXED_NOW)
    }

    pub fn harness_at(unix_secs: i64) -> CacheHarness {
        let clock = ManualClock::new(unix_secs);
        let store = Arc::new(RecordingStore::with_clock(Arc::new(clock.clone())));
        let logger = Arc::new(RecordingLogger::new());
        let cache = AvailableCache::new(Arc::clone(&store), logger.clone())
            .with_clock(Arc::new(clock.clone()));
        CacheHarness {
            cache,
            store,
            logger,
            clock,
        }
    }

    /// Default config with alarms routed to `recorder`.
    pub fn alarmed_config(recorder: &AlarmRecorder) -> RunConfig {
        RunConfig::new().with_alarm(recorder.callback())
    }

    /// Write a tier record directly, bypassing the engine.
    pub async fn seed_record<S: CacheStore + ?Sized>(
        store: &S,
        key: &str,
        value: Value,
        expire_time: i64,
    ) -> StoreResult<()> {
        store
            .put(
                key,
                json!({ "origin_data": value, "expire_time": expire_time }),
                0,
            )
            .await
    }

    /// Whether the generation lock for `base_key` is currently held.
    pub async fn generate_lock_held<S: CacheStore + ?Sized>(
        store: &S,
        base_key: &str,
    ) -> StoreResult<bool> {
        Ok(store
            .get(DerivedKeys::new(base_key).generate_lock())
            .await?
            .is_some())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache results and stored records.

    use super::*;
    use std::fmt::Debug;

    /// Assert that a result is a configuration error.
    #[track_caller]
    pub fn assert_config_error<T: Debug>(result: &AvailCacheResult<T>) {
        match result {
            Err(AvailCacheError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a result is a storage error.
    #[track_caller]
    pub fn assert_storage_error<T: Debug>(result: &AvailCacheResult<T>) {
        match result {
            Err(AvailCacheError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a raw store value is a tier record with the given contents.
    #[track_caller]
    pub fn assert_record(raw: &Value, origin_data: &Value, expire_time: i64) {
        assert_eq!(
            raw,
            &json!({ "origin_data": origin_data, "expire_time": expire_time }),
            "Unexpected tier record"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
