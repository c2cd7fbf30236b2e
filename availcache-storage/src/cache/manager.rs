//! Entry point bundling both engines over one store.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use availcache_core::{AvailCacheResult, Clock, RunConfig, SimpleConfig, SystemClock};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::available::AvailableCache;
use super::logger::{CacheLogger, TracingLogger};
use super::simple::{SimpleCache, SimpleCacheError};
use crate::store::CacheStore;

/// Hands out the single-tier and two-tier engines sharing one store, logger and clock.
pub struct AvailableCacheManager<S: CacheStore + ?Sized> {
    store: Arc<S>,
    logger: Arc<dyn CacheLogger>,
    clock: Arc<dyn Clock>,
}

impl<S: CacheStore + ?Sized> Clone for AvailableCacheManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            logger: Arc::clone(&self.logger),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: CacheStore + ?Sized> AvailableCacheManager<S> {
    pub fn new(store: Arc<S>, logger: Arc<dyn CacheLogger>) -> Self {
        Self {
            store,
            logger,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_tracing(store: Arc<S>) -> Self {
        Self::new(store, Arc::new(TracingLogger))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn simple_cache(&self) -> SimpleCache<S> {
        SimpleCache::new(Arc::clone(&self.store))
    }

    pub fn available_cache(&self) -> AvailableCache<S> {
        AvailableCache::new(Arc::clone(&self.store), Arc::clone(&self.logger))
            .with_clock(Arc::clone(&self.clock))
    }

    /// Single-tier lookup. See [`SimpleCache::get`].
    pub async fn simple<T, F, Fut, E>(
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
        self.simple_cache()
            .get(key, producer, config, overwrite)
            .await
    }

    /// Two-tier lookup. See [`AvailableCache::get`].
    pub async fn l2<T, F, Fut, E>(
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
        self.available_cache()
            .get(key, producer, config, overwrite)
            .await
    }
}
