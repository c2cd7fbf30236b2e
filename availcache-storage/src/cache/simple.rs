//! Single-tier read-through cache.
//!
//! One store key, one TTL, no locks, no alarms: a miss (or `overwrite`) runs
//! the producer and unconditionally writes its result. Concurrent misses all
//! run the producer. Use [`super::AvailableCache`] when that matters.

use std::future::Future;
use std::sync::Arc;

use availcache_core::{ttl_minutes, AvailCacheError, SimpleConfig, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::store::CacheStore;

/// Failure of a single-tier lookup.
#[derive(Debug, Error)]
pub enum SimpleCacheError<E> {
    /// The producer failed; nothing was written.
    #[error("Producer failed: {0}")]
    Producer(E),

    #[error(transparent)]
    Cache(#[from] AvailCacheError),
}

/// Plain read-through cache over a [`CacheStore`].
pub struct SimpleCache<S: CacheStore + ?Sized> {
    store: Arc<S>,
}

impl<S: CacheStore + ?Sized> Clone for SimpleCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CacheStore + ?Sized> SimpleCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the value under `key`, producing and storing it on a miss.
    ///
    /// A stored value that no longer deserializes as `T` counts as a miss.
    pub async fn get<T, F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        config: &SimpleConfig,
        overwrite: bool,
    ) -> Result<T, SimpleCacheError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !overwrite {
            let cached = self.store.get(key).await.map_err(AvailCacheError::from)?;
            if let Some(value) = cached.and_then(|raw| serde_json::from_value(raw).ok()) {
                return Ok(value);
            }
        }

        let value = producer().await.map_err(SimpleCacheError::Producer)?;
        let raw = serde_json::to_value(&value).map_err(|e| {
            AvailCacheError::from(StorageError::Serialization {
                reason: e.to_string(),
            })
        })?;
        self.store
            .put(key, raw, ttl_minutes(config.expire_interval))
            .await
            .map_err(AvailCacheError::from)?;
        Ok(value)
    }
}
