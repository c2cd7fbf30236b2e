//! AvailCache Storage - Cache Engines and Store Backends
//!
//! The two-tier read-through cache, its single-tier sibling, and the
//! key-value stores they run on (in-memory and LMDB).

pub mod cache;
pub mod store;

// Re-export engine types for callers
pub use cache::{
    AvailableCache, AvailableCacheManager, CacheLogger, DerivedKeys, Lookup, LookupSource,
    ProbeEvent, SimpleCache, SimpleCacheError, StoredRecord, TracingLogger,
    NEAR_EXPIRY_ALARM_MESSAGE,
};

pub use store::{CacheStore, InMemoryStore, LmdbStore, LmdbStoreError, StoreResult};
