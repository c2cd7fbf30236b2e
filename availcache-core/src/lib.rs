//! Availcache Core - Shared Types
//!
//! Pure data structures used by every other crate: error taxonomy, run
//! configuration, clock abstraction and call identifiers. No I/O lives here.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AlarmCallback, RunConfig, SimpleConfig, TierIntervals, ALARM_LOCK_INTERVAL,
    DEFAULT_CACHE_LOCK_INTERVAL, DEFAULT_EXPIRE_INTERVAL, DEFAULT_L1_EXPIRE_INTERVAL,
    DEFAULT_L2_EXPIRE_INTERVAL, L2_EXPIRE_INTERVAL_REMAIN_INTERVAL,
    MIN_L1_AND_L2_EXPIRE_INTERVAL_DIFF,
};
pub use error::{AvailCacheError, AvailCacheResult, BoxError, ConfigError, StorageError};

// ============================================================================
// TIME TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Convert a second-based interval into the whole minutes a cache store expects.
///
/// Intervals below one minute truncate to `0`, which stores treat as "no expiry".
pub fn ttl_minutes(interval_secs: u64) -> u64 {
    interval_secs / 60
}

// ============================================================================
// CALL IDENTIFIER
// ============================================================================

/// Best-effort unique token correlating the diagnostic records of one call.
///
/// Format: `YYYYmmddHHMMSS` followed by a six-digit random suffix. It carries
/// no meaning outside the process that generated it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    /// Generate an identifier for a call starting at `now`.
    pub fn generate(now: Timestamp) -> Self {
        let suffix: u32 = rand::rng().random_range(100_000..=999_999);
        Self(format!("{}{}", now.format("%Y%m%d%H%M%S"), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
