//! Read-through cache engines.
//!
//! [`AvailableCache`] keeps a short-lived primary tier and a long-lived
//! safety-net tier under derived keys, serializes regeneration behind a
//! generation lock and raises de-duplicated alarms when it has to serve
//! stale data. [`SimpleCache`] is the plain single-tier variant.

mod alarm;
pub mod available;
pub mod codec;
pub mod keys;
pub mod logger;
pub mod lookup;
pub mod manager;
mod probe;
pub mod simple;

pub use available::{AvailableCache, NEAR_EXPIRY_ALARM_MESSAGE};
pub use codec::StoredRecord;
pub use keys::DerivedKeys;
pub use logger::{CacheLogger, TracingLogger};
pub use lookup::{Lookup, LookupSource};
pub use manager::AvailableCacheManager;
pub use probe::ProbeEvent;
pub use simple::{SimpleCache, SimpleCacheError};

use std::any::Any;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "producer panicked".to_string()
    }
}
