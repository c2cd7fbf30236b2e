//! Wall-clock abstraction.
//!
//! Freshness deadlines are absolute Unix timestamps, so every component that
//! writes or checks them reads time through a [`Clock`]. Tests pin or advance
//! time instead of sleeping.

use crate::Timestamp;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;

    /// Current instant as whole Unix seconds.
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Pin the clock to a Unix timestamp; out-of-range values fall back to the epoch.
    pub fn at_unix(seconds: i64) -> Self {
        Self(DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::UNIX_EPOCH))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
