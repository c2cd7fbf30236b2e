//! Alarm dispatcher.
//!
//! Delivers operator notifications through the run's [`AlarmCallback`],
//! de-duplicated by an alarm lock held in the cache store for
//! [`ALARM_LOCK_INTERVAL`] seconds. The lock is never released explicitly:
//! it simply expires, which rate-limits alarms per base key.

use std::panic::{catch_unwind, AssertUnwindSafe};

use availcache_core::{ttl_minutes, AlarmCallback, ALARM_LOCK_INTERVAL};
use serde_json::json;
use tracing::Level;

use super::logger::CacheLogger;
use super::panic_message;
use super::probe::{Probe, ProbeEvent};
use crate::store::{CacheStore, StoreResult};

/// Sends at most one alarm per alarm-lock window.
pub struct AlarmDispatcher<'a, S: CacheStore + ?Sized> {
    store: &'a S,
    logger: &'a dyn CacheLogger,
    probe: &'a Probe<'a>,
    lock_key: &'a str,
    callback: Option<&'a AlarmCallback>,
}

impl<'a, S: CacheStore + ?Sized> AlarmDispatcher<'a, S> {
    pub fn new(
        store: &'a S,
        logger: &'a dyn CacheLogger,
        probe: &'a Probe<'a>,
        lock_key: &'a str,
        callback: Option<&'a AlarmCallback>,
    ) -> Self {
        Self {
            store,
            logger,
            probe,
            lock_key,
            callback,
        }
    }

    /// Try to deliver `message`.
    ///
    /// Returns `Ok(true)` once this call has taken the alarm lock and handed
    /// the message to the callback. A callback failure is logged at ERROR and
    /// still counts as dispatched, since the lock now silences other callers.
    /// With no callback, or with the alarm lock already held, returns
    /// `Ok(false)`. Only a store failure while taking the lock is an error.
    pub async fn dispatch(&self, message: &str) -> StoreResult<bool> {
        let Some(callback) = self.callback else {
            return Ok(false);
        };

        let acquired = self
            .store
            .add(self.lock_key, json!(1), ttl_minutes(ALARM_LOCK_INTERVAL))
            .await?;
        self.probe
            .record(ProbeEvent::AddAlarmLock, || json!({ "result": acquired }));
        if !acquired {
            return Ok(false);
        }

        let failure = match catch_unwind(AssertUnwindSafe(|| callback.notify(message))) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };

        match failure {
            None => self
                .probe
                .record(ProbeEvent::SendingAlarms, || json!({ "message": message })),
            Some(failure) => self.logger.log(
                Level::ERROR,
                &failure,
                &json!({ "alarm_lock_key": self.lock_key, "alarm_message": message }),
            ),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use availcache_core::{CallId, Clock, SystemClock};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CaptureLogger {
        records: Mutex<Vec<(Level, String)>>,
    }

    impl CacheLogger for CaptureLogger {
        fn log(&self, level: Level, message: &str, _context: &Value) {
            self.records.lock().unwrap().push((level, message.to_string()));
        }
    }

    fn collecting_callback() -> (AlarmCallback, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let callback = AlarmCallback::new(move |msg| {
            sink.lock().unwrap().push(msg.to_string());
            Ok(())
        });
        (callback, sent)
    }

    #[tokio::test]
    async fn test_no_callback_is_noop() {
        let store = InMemoryStore::new();
        let logger = CaptureLogger::default();
        let probe = Probe::new(false, CallId::generate(SystemClock.now()), &logger);
        let dispatcher = AlarmDispatcher::new(&store, &logger, &probe, "k_alarm_lock", None);

        assert!(!dispatcher.dispatch("boom").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_alarm_lock_deduplicates() {
        let store = InMemoryStore::new();
        let logger = CaptureLogger::default();
        let probe = Probe::new(false, CallId::generate(SystemClock.now()), &logger);
        let (callback, sent) = collecting_callback();
        let dispatcher =
            AlarmDispatcher::new(&store, &logger, &probe, "k_alarm_lock", Some(&callback));

        assert!(dispatcher.dispatch("first").await.unwrap());
        assert!(!dispatcher.dispatch("second").await.unwrap());
        assert_eq!(*sent.lock().unwrap(), vec!["first".to_string()]);
        assert!(store.get("k_alarm_lock").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failing_callback_is_logged_not_raised() {
        let store = InMemoryStore::new();
        let logger = CaptureLogger::default();
        let probe = Probe::new(false, CallId::generate(SystemClock.now()), &logger);
        let callback = AlarmCallback::new(|_| Err("pager offline".into()));
        let dispatcher =
            AlarmDispatcher::new(&store, &logger, &probe, "k_alarm_lock", Some(&callback));

        assert!(dispatcher.dispatch("boom").await.unwrap());
        assert!(!dispatcher.dispatch("again").await.unwrap());
        assert_eq!(
            *logger.records.lock().unwrap(),
            vec![(Level::ERROR, "pager offline".to_string())]
        );
    }

    #[tokio::test]
    async fn test_panicking_callback_is_contained() {
        let store = InMemoryStore::new();
        let logger = CaptureLogger::default();
        let probe = Probe::new(false, CallId::generate(SystemClock.now()), &logger);
        let callback = AlarmCallback::new(|_| panic!("webhook crashed"));
        let dispatcher =
            AlarmDispatcher::new(&store, &logger, &probe, "k_alarm_lock", Some(&callback));

        assert!(dispatcher.dispatch("boom").await.unwrap());
        assert!(store.get("k_alarm_lock").await.unwrap().is_some());
        let records = logger.records.lock().unwrap();
        assert_eq!(records[0].0, Level::ERROR);
        assert!(records[0].1.contains("webhook crashed"));
    }
}
