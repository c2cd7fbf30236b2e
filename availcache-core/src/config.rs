//! Configuration types

use crate::error::{BoxError, ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default primary tier lifetime in seconds.
pub const DEFAULT_L1_EXPIRE_INTERVAL: u64 = 600;
/// Default safety-net tier lifetime in seconds.
pub const DEFAULT_L2_EXPIRE_INTERVAL: u64 = 86_400;
/// Default generation lock lifetime in seconds.
pub const DEFAULT_CACHE_LOCK_INTERVAL: u64 = 300;
/// Default lifetime of a single-tier entry in seconds.
pub const DEFAULT_EXPIRE_INTERVAL: u64 = 600;

/// Minimum number of seconds the safety-net tier must outlive the primary tier.
pub const MIN_L1_AND_L2_EXPIRE_INTERVAL_DIFF: u64 = 3600;
/// Remaining safety-net lifetime (seconds) below which an alarm is raised.
pub const L2_EXPIRE_INTERVAL_REMAIN_INTERVAL: i64 = 3600;
/// Lifetime of the alarm de-duplication lock in seconds.
pub const ALARM_LOCK_INTERVAL: u64 = 600;

/// Environment variable overriding the primary tier lifetime.
pub const ENV_L1_EXPIRE_INTERVAL: &str = "AVAILCACHE_L1_EXPIRE_INTERVAL";
/// Environment variable overriding the safety-net tier lifetime.
pub const ENV_L2_EXPIRE_INTERVAL: &str = "AVAILCACHE_L2_EXPIRE_INTERVAL";
/// Environment variable overriding the generation lock lifetime.
pub const ENV_CACHE_LOCK_INTERVAL: &str = "AVAILCACHE_CACHE_LOCK_INTERVAL";
/// Environment variable enabling diagnostics.
pub const ENV_PROBE: &str = "AVAILCACHE_PROBE";

/// Operator notification hook.
///
/// Receives a human-readable message. Returning an error (or panicking) is
/// allowed; the cache logs the failure and carries on.
#[derive(Clone)]
pub struct AlarmCallback {
    inner: Arc<dyn Fn(&str) -> Result<(), BoxError> + Send + Sync>,
}

impl AlarmCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Invoke the callback with `message`.
    pub fn notify(&self, message: &str) -> Result<(), BoxError> {
        (self.inner)(message)
    }
}

impl fmt::Debug for AlarmCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AlarmCallback(<fn>)")
    }
}

/// Numeric tier settings, loadable from serde sources or the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierIntervals {
    /// Primary tier lifetime in seconds.
    #[serde(default = "default_l1_expire_interval")]
    pub l1_expire_interval: u64,
    /// Safety-net tier lifetime in seconds.
    #[serde(default = "default_l2_expire_interval")]
    pub l2_expire_interval: u64,
    /// Generation lock lifetime in seconds.
    #[serde(default = "default_cache_lock_interval")]
    pub cache_lock_interval: u64,
    /// Emit diagnostic probe records.
    #[serde(default)]
    pub probe: bool,
}

fn default_l1_expire_interval() -> u64 {
    DEFAULT_L1_EXPIRE_INTERVAL
}

fn default_l2_expire_interval() -> u64 {
    DEFAULT_L2_EXPIRE_INTERVAL
}

fn default_cache_lock_interval() -> u64 {
    DEFAULT_CACHE_LOCK_INTERVAL
}

impl Default for TierIntervals {
    fn default() -> Self {
        Self {
            l1_expire_interval: DEFAULT_L1_EXPIRE_INTERVAL,
            l2_expire_interval: DEFAULT_L2_EXPIRE_INTERVAL,
            cache_lock_interval: DEFAULT_CACHE_LOCK_INTERVAL,
            probe: false,
        }
    }
}

impl TierIntervals {
    /// Load settings from `AVAILCACHE_*` environment variables.
    ///
    /// Unset variables keep their defaults; set but unparseable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut intervals = Self::default();
        if let Some(raw) = lookup(ENV_L1_EXPIRE_INTERVAL) {
            intervals.l1_expire_interval = parse_seconds(ENV_L1_EXPIRE_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_L2_EXPIRE_INTERVAL) {
            intervals.l2_expire_interval = parse_seconds(ENV_L2_EXPIRE_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CACHE_LOCK_INTERVAL) {
            intervals.cache_lock_interval = parse_seconds(ENV_CACHE_LOCK_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PROBE) {
            intervals.probe = parse_flag(ENV_PROBE, &raw)?;
        }
        Ok(intervals)
    }
}

fn parse_seconds(field: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: "expected a non-negative number of seconds".to_string(),
    })
}

fn parse_flag(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Per-call configuration for the two-tier cache.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Primary tier lifetime in seconds.
    pub l1_expire_interval: u64,
    /// Safety-net tier lifetime in seconds.
    pub l2_expire_interval: u64,
    /// Generation lock lifetime in seconds.
    pub cache_lock_interval: u64,
    /// Operator notification hook; alarms are skipped when absent.
    pub alarm: Option<AlarmCallback>,
    /// Emit diagnostic probe records.
    pub probe: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_intervals(TierIntervals::default())
    }
}

impl From<TierIntervals> for RunConfig {
    fn from(intervals: TierIntervals) -> Self {
        Self::from_intervals(intervals)
    }
}

impl RunConfig {
    /// Create a new run config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a run config from numeric settings, without an alarm hook.
    pub fn from_intervals(intervals: TierIntervals) -> Self {
        Self {
            l1_expire_interval: intervals.l1_expire_interval,
            l2_expire_interval: intervals.l2_expire_interval,
            cache_lock_interval: intervals.cache_lock_interval,
            alarm: None,
            probe: intervals.probe,
        }
    }

    /// Set the primary tier lifetime (seconds).
    pub fn with_l1_expire_interval(mut self, seconds: u64) -> Self {
        self.l1_expire_interval = seconds;
        self
    }

    /// Set the safety-net tier lifetime (seconds).
    pub fn with_l2_expire_interval(mut self, seconds: u64) -> Self {
        self.l2_expire_interval = seconds;
        self
    }

    /// Set the generation lock lifetime (seconds).
    pub fn with_cache_lock_interval(mut self, seconds: u64) -> Self {
        self.cache_lock_interval = seconds;
        self
    }

    /// Install an alarm hook.
    pub fn with_alarm(mut self, alarm: AlarmCallback) -> Self {
        self.alarm = Some(alarm);
        self
    }

    /// Enable or disable diagnostics.
    pub fn with_probe(mut self, enabled: bool) -> Self {
        self.probe = enabled;
        self
    }

    /// The numeric part of this config.
    pub fn intervals(&self) -> TierIntervals {
        TierIntervals {
            l1_expire_interval: self.l1_expire_interval,
            l2_expire_interval: self.l2_expire_interval,
            cache_lock_interval: self.cache_lock_interval,
            probe: self.probe,
        }
    }

    /// Check that the safety-net tier outlives the primary tier by the minimum gap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = self
            .l1_expire_interval
            .saturating_add(MIN_L1_AND_L2_EXPIRE_INTERVAL_DIFF);
        if required > self.l2_expire_interval {
            return Err(ConfigError::IntervalGapTooSmall {
                l1_expire_interval: self.l1_expire_interval,
                l2_expire_interval: self.l2_expire_interval,
                min_gap: MIN_L1_AND_L2_EXPIRE_INTERVAL_DIFF,
            });
        }
        Ok(())
    }
}

/// Configuration for the single-tier cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleConfig {
    /// Entry lifetime in seconds.
    #[serde(default = "default_expire_interval")]
    pub expire_interval: u64,
}

fn default_expire_interval() -> u64 {
    DEFAULT_EXPIRE_INTERVAL
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            expire_interval: DEFAULT_EXPIRE_INTERVAL,
        }
    }
}

impl SimpleConfig {
    pub fn new(expire_interval: u64) -> Self {
        Self { expire_interval }
    }
}
