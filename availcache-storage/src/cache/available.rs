//! Stampede-protected two-tier read-through cache.
//!
//! Each logical entry lives twice in the store: a short-lived primary (L1)
//! record serving the fast path, and a long-lived safety-net (L2) record
//! serving degraded reads. On a primary miss exactly one caller (best
//! effort) wins the generation lock and runs the producer; everyone else
//! falls back to the safety-net record instead of piling onto the producer.
//!
//! ```text
//! get ─► read L1 ─► hit, no overwrite? ──yes──► value
//!          │ no
//!          ▼
//!     add generate lock ──won──► producer ──ok──► put L1 + L2 ──► value
//!          │                       │ err/panic
//!          │ lost                  ▼
//!          │                  log + alarm ──► L2 value or absent
//!          ▼                   (lock released on every path)
//!     L2 absent or near expiry? ──► alarm
//!          ▼
//!     L2 value or absent
//! ```
//!
//! The locks are advisory and time-bounded. There is no fencing token, so a
//! producer that outlives `cache_lock_interval` can race a second one.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use availcache_core::{
    ttl_minutes, AvailCacheResult, CallId, Clock, RunConfig, SystemClock,
    L2_EXPIRE_INTERVAL_REMAIN_INTERVAL,
};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::Level;

use super::alarm::AlarmDispatcher;
use super::codec::{decode, StoredRecord};
use super::keys::DerivedKeys;
use super::logger::{CacheLogger, TracingLogger};
use super::lookup::Lookup;
use super::panic_message;
use super::probe::{Probe, ProbeEvent};
use crate::store::{CacheStore, StoreResult};

/// Alarm sent when a contended caller finds the safety-net tier missing or
/// within [`L2_EXPIRE_INTERVAL_REMAIN_INTERVAL`] seconds of expiry.
pub const NEAR_EXPIRY_ALARM_MESSAGE: &str =
    "safety-net cache tier is absent or close to expiry, needs urgent attention";

/// Value stored under lock keys.
const LOCK_SENTINEL: u8 = 1;

/// Two-tier read-through cache with generation lock and alarms.
///
/// Holds no per-key state: every call derives its keys and parses its
/// [`RunConfig`] afresh, so one instance can be shared by any number of
/// concurrent callers.
///
/// # Example
///
/// ```ignore
/// let cache = AvailableCache::with_tracing(Arc::new(InMemoryStore::new()));
/// let config = RunConfig::new().with_alarm(AlarmCallback::new(|msg| page_oncall(msg)));
///
/// let report: Option<Report> = cache
///     .get("daily_report", || async { build_report().await }, &config, false)
///     .await?;
/// ```
pub struct AvailableCache<S: CacheStore + ?Sized> {
    store: Arc<S>,
    logger: Arc<dyn CacheLogger>,
    clock: Arc<dyn Clock>,
}

impl<S: CacheStore + ?Sized> Clone for AvailableCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            logger: Arc::clone(&self.logger),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: CacheStore + ?Sized> AvailableCache<S> {
    pub fn new(store: Arc<S>, logger: Arc<dyn CacheLogger>) -> Self {
        Self {
            store,
            logger,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a cache that logs through `tracing`.
    pub fn with_tracing(store: Arc<S>) -> Self {
        Self::new(store, Arc::new(TracingLogger))
    }

    /// Replace the clock used for freshness deadlines.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the cached value for `key`, regenerating it when needed.
    ///
    /// `None` is the absent result: no primary record, and the fallback path
    /// found no safety-net record either.
    ///
    /// # Errors
    ///
    /// - `Config` if the safety-net tier does not outlive the primary tier by
    ///   the minimum gap (checked before any store access).
    /// - `Storage` if the store itself fails.
    ///
    /// Producer errors and panics are never returned: they are logged,
    /// alarmed, and answered from the safety-net tier.
    pub async fn get<T, F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        config: &RunConfig,
        overwrite: bool,
    ) -> AvailCacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.resolve(key, producer, config, overwrite)
            .await
            .map(Lookup::into_value)
    }

    /// Like [`AvailableCache::get`], but reports where the value came from.
    pub async fn resolve<T, F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        config: &RunConfig,
        overwrite: bool,
    ) -> AvailCacheResult<Lookup<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        config.validate()?;

        let run = Run {
            store: &*self.store,
            logger: &*self.logger,
            clock: &*self.clock,
            config,
            keys: DerivedKeys::new(key),
            probe: Probe::new(
                config.probe,
                CallId::generate(self.clock.now()),
                &*self.logger,
            ),
        };
        run.probe.initialize(&run.keys, config);

        let primary = run.read_record::<T>(run.keys.l1()).await?;
        if let Some(record) = primary.filter(|_| !overwrite) {
            return Ok(Lookup::primary(record.into_value()));
        }

        if run.add_generate_lock().await? {
            run.regenerate(producer).await
        } else {
            run.fall_back_contended().await
        }
    }
}

/// State of a single `resolve` call.
struct Run<'a, S: CacheStore + ?Sized> {
    store: &'a S,
    logger: &'a dyn CacheLogger,
    clock: &'a dyn Clock,
    config: &'a RunConfig,
    keys: DerivedKeys,
    probe: Probe<'a>,
}

impl<S: CacheStore + ?Sized> Run<'_, S> {
    async fn read_record<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> StoreResult<Option<StoredRecord<T>>> {
        let raw = self.store.get(key).await?;
        self.probe.record(ProbeEvent::GetCacheData, || {
            json!({ "key": key, "data": raw })
        });
        Ok(decode(raw))
    }

    async fn write_record<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        interval: u64,
        now: i64,
    ) -> StoreResult<()> {
        let raw = StoredRecord::encode(value, interval, now).to_store_value()?;
        self.probe.record(ProbeEvent::SetCacheData, || {
            json!({ "key": key, "data": raw, "interval": interval })
        });
        self.store.put(key, raw, ttl_minutes(interval)).await
    }

    async fn add_generate_lock(&self) -> StoreResult<bool> {
        let acquired = self
            .store
            .add(
                self.keys.generate_lock(),
                json!(LOCK_SENTINEL),
                ttl_minutes(self.config.cache_lock_interval),
            )
            .await?;
        self.probe
            .record(ProbeEvent::AddGenerateLock, || json!({ "result": acquired }));
        Ok(acquired)
    }

    async fn clear_generate_lock(&self) -> StoreResult<bool> {
        let cleared = self.store.forget(self.keys.generate_lock()).await?;
        self.probe
            .record(ProbeEvent::ClearGenerateLock, || json!({ "result": cleared }));
        Ok(cleared)
    }

    fn alarms(&self) -> AlarmDispatcher<'_, S> {
        AlarmDispatcher::new(
            self.store,
            self.logger,
            &self.probe,
            self.keys.alarm_lock(),
            self.config.alarm.as_ref(),
        )
    }

    /// Run the producer while holding the generation lock.
    ///
    /// The lock is forgotten after the producer settles, whatever the outcome.
    async fn regenerate<T, F, Fut, E>(&self, producer: F) -> AvailCacheResult<Lookup<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let produced = match AssertUnwindSafe(async move { producer().await })
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        };

        let outcome = match produced {
            Ok(value) => self.store_tiers(value).await,
            Err(message) => self.fall_back_failed(&message).await,
        };
        let released = self.clear_generate_lock().await;

        let lookup = outcome?;
        released?;
        Ok(lookup)
    }

    async fn store_tiers<T: Serialize>(&self, value: T) -> AvailCacheResult<Lookup<T>> {
        let now = self.clock.unix_timestamp();
        self.write_record(self.keys.l1(), &value, self.config.l1_expire_interval, now)
            .await?;
        self.write_record(self.keys.l2(), &value, self.config.l2_expire_interval, now)
            .await?;
        Ok(Lookup::regenerated(value))
    }

    async fn fall_back_failed<T: DeserializeOwned>(
        &self,
        message: &str,
    ) -> AvailCacheResult<Lookup<T>> {
        self.logger.log(
            Level::ERROR,
            message,
            &json!({ "key": self.keys.base(), "id": self.probe.call_id().as_str() }),
        );
        let alarmed = self.alarms().dispatch(message).await?;
        let fallback = self.read_record::<T>(self.keys.l2()).await?;
        Ok(Lookup::fallback(
            fallback.map(StoredRecord::into_value),
            alarmed,
        ))
    }

    async fn fall_back_contended<T: DeserializeOwned>(&self) -> AvailCacheResult<Lookup<T>> {
        let fallback = self.read_record::<T>(self.keys.l2()).await?;
        let now = self.clock.unix_timestamp();
        let needs_attention = fallback.as_ref().map_or(true, |record| {
            record.remaining_below_threshold(now, L2_EXPIRE_INTERVAL_REMAIN_INTERVAL)
        });

        let alarmed = if needs_attention {
            self.alarms().dispatch(NEAR_EXPIRY_ALARM_MESSAGE).await?
        } else {
            false
        };
        Ok(Lookup::fallback(
            fallback.map(StoredRecord::into_value),
            alarmed,
        ))
    }
}
