//! In-process cache store.
//!
//! Entries live in a `HashMap` behind a tokio `RwLock`. Expiry is evaluated
//! lazily against the injected [`Clock`], so tests can move time forward
//! without sleeping.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use availcache_core::{Clock, SystemClock};
use serde_json::Value;
use tokio::sync::RwLock;

use super::traits::{CacheStore, StoreResult};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    /// Unix seconds after which the entry is gone; `None` never expires.
    deadline: Option<i64>,
}

impl MemoryEntry {
    fn new(value: Value, ttl_minutes: u64, now: i64) -> Self {
        let deadline = (ttl_minutes > 0).then(|| {
            let ttl_secs = i64::try_from(ttl_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
            now.saturating_add(ttl_secs)
        });
        Self { value, deadline }
    }

    fn is_live(&self, now: i64) -> bool {
        self.deadline.map_or(true, |deadline| now < deadline)
    }
}

/// `HashMap`-backed store with lazy TTL expiry.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that evaluates expiry against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = self.clock.unix_timestamp();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry, live or not.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Remove expired entries, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.unix_timestamp();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = self.clock.unix_timestamp();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn add(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<bool> {
        let now = self.clock.unix_timestamp();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(key.to_string(), MemoryEntry::new(value, ttl_minutes, now));
        Ok(true)
    }

    async fn put(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<()> {
        let now = self.clock.unix_timestamp();
        self.entries
            .write()
            .await
            .insert(key.to_string(), MemoryEntry::new(value, ttl_minutes, now));
        Ok(())
    }

    async fn forget(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.unix_timestamp();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use availcache_core::Timestamp;
    use chrono::DateTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Debug)]
    struct StepClock(AtomicI64);

    impl StepClock {
        fn advance(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Timestamp {
            DateTime::from_timestamp(self.0.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    fn store_at(start: i64) -> (InMemoryStore, Arc<StepClock>) {
        let clock = Arc::new(StepClock(AtomicI64::new(start)));
        (InMemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryStore::new();
        store.put("k", json!({"a": 1}), 10).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_only_creates_once() {
        let store = InMemoryStore::new();
        assert!(store.add("lock", json!(1), 5).await.unwrap());
        assert!(!store.add("lock", json!(2), 5).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_forget_reports_existence() {
        let store = InMemoryStore::new();
        store.put("k", json!("v"), 0).await.unwrap();
        assert!(store.forget("k").await.unwrap());
        assert!(!store.forget("k").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let (store, clock) = store_at(1_000);
        store.put("k", json!("v"), 1).await.unwrap();

        clock.advance(59);
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(1);
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.forget("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_succeeds_over_expired_entry() {
        let (store, clock) = store_at(0);
        assert!(store.add("lock", json!(1), 5).await.unwrap());
        clock.advance(5 * 60);
        assert!(store.add("lock", json!(1), 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let (store, clock) = store_at(0);
        store.put("k", json!(true), 0).await.unwrap();
        clock.advance(10 * 365 * 86_400);
        assert_eq!(store.get("k").await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_at(0);
        store.put("short", json!(1), 1).await.unwrap();
        store.put("long", json!(2), 10).await.unwrap();
        clock.advance(120);

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);

        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_has_single_winner() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.add("contended", json!(i), 5).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
