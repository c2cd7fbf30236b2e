//! Error types for availcache operations

use thiserror::Error;

/// Boxed error returned by caller-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors.
///
/// These signal a programming or deployment mistake and are raised before
/// the cache store is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "l2_expire_interval ({l2_expire_interval}s) must exceed l1_expire_interval \
         ({l1_expire_interval}s) by at least {min_gap}s"
    )]
    IntervalGapTooSmall {
        l1_expire_interval: u64,
        l2_expire_interval: u64,
        min_gap: u64,
    },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization failed: {reason}")]
    Deserialization { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Master error type for all availcache errors.
///
/// Producer and alarm failures never show up here: they are absorbed by the
/// cache and turned into fallback reads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AvailCacheError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for availcache operations.
pub type AvailCacheResult<T> = Result<T, AvailCacheError>;

// =============================================================================
// TESTS
// =============================================================================
