//! Cache store trait.

use async_trait::async_trait;
use availcache_core::StorageError;
use serde_json::Value;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StorageError>;

/// Key-value store backing the cache engines.
///
/// Implementations must be safe to share between concurrent callers. The only
/// cross-caller coordination the engines rely on is that [`CacheStore::add`]
/// is atomic: of several concurrent `add` calls for an absent key, exactly one
/// observes `true`.
///
/// # TTLs
///
/// `ttl_minutes == 0` means the entry never expires. Expired entries must be
/// invisible to every operation.
///
/// # Errors
///
/// A miss is `Ok(None)`, never an error. `Err` is reserved for the store
/// itself failing (I/O, transaction, encoding).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Store `value` only if `key` holds no live entry.
    ///
    /// Returns true iff this call created the entry.
    async fn add(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<bool>;

    /// Store `value`, replacing any existing entry.
    async fn put(&self, key: &str, value: Value, ttl_minutes: u64) -> StoreResult<()>;

    /// Delete `key`.
    ///
    /// Returns true iff a live entry was removed.
    async fn forget(&self, key: &str) -> StoreResult<bool>;
}
