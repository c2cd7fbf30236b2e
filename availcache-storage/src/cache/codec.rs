//! Stored record codec.
//!
//! Both tiers store the produced value wrapped together with its absolute
//! freshness deadline:
//!
//! ```text
//! { "origin_data": <value>, "expire_time": <unix seconds or 0> }
//! ```
//!
//! A store miss and a record without `origin_data` decode identically: as
//! absent. Neither is an error.

use availcache_core::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field holding the wrapped value.
pub const ORIGIN_DATA_FIELD: &str = "origin_data";
/// Field holding the absolute deadline.
pub const EXPIRE_TIME_FIELD: &str = "expire_time";

/// A value plus the Unix timestamp at which it stops being fresh.
///
/// `expire_time == 0` means no deadline was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    pub origin_data: T,
    #[serde(default)]
    pub expire_time: i64,
}

impl<T> StoredRecord<T> {
    /// Wrap `value` with a deadline `ttl_secs` after `now`, or none when `ttl_secs` is 0.
    pub fn encode(value: T, ttl_secs: u64, now: i64) -> Self {
        let expire_time = if ttl_secs > 0 {
            now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
        } else {
            0
        };
        Self {
            origin_data: value,
            expire_time,
        }
    }

    /// True iff a deadline is recorded and less than `threshold_secs` remain before it.
    pub fn remaining_below_threshold(&self, now: i64, threshold_secs: i64) -> bool {
        if self.expire_time == 0 || threshold_secs <= 0 {
            return false;
        }
        self.expire_time.saturating_sub(now) < threshold_secs
    }

    pub fn into_value(self) -> T {
        self.origin_data
    }
}

impl<T: Serialize> StoredRecord<T> {
    /// Serialize into the JSON shape written to the store.
    pub fn to_store_value(&self) -> Result<Value, StorageError> {
        serde_json::to_value(self).map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })
    }
}

/// Unpack a raw store value.
///
/// Returns `None` for a miss, a non-object value, a missing `origin_data`
/// field, or an `origin_data` that does not deserialize as `T`.
pub fn decode<T: DeserializeOwned>(raw: Option<Value>) -> Option<StoredRecord<T>> {
    let Value::Object(mut fields) = raw? else {
        return None;
    };
    let origin_data = serde_json::from_value(fields.remove(ORIGIN_DATA_FIELD)?).ok()?;
    let expire_time = fields
        .get(EXPIRE_TIME_FIELD)
        .and_then(Value::as_i64)
        .unwrap_or(0);
    Some(StoredRecord {
        origin_data,
        expire_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encode_sets_deadline() {
        let record = StoredRecord::encode("v", 600, 1_000);
        assert_eq!(record.expire_time, 1_600);
        assert_eq!(record.origin_data, "v");

        let no_deadline = StoredRecord::encode("v", 0, 1_000);
        assert_eq!(no_deadline.expire_time, 0);
    }

    #[test]
    fn test_store_value_shape() {
        let value = StoredRecord::encode(json!({"n": 1}), 60, 10)
            .to_store_value()
            .unwrap();
        assert_eq!(value, json!({"origin_data": {"n": 1}, "expire_time": 70}));
    }

    #[test]
    fn test_decode_miss_is_absent() {
        assert_eq!(decode::<String>(None), None);
    }

    #[test]
    fn test_decode_malformed_is_absent() {
        assert_eq!(decode::<String>(Some(json!({"expire_time": 5}))), None);
        assert_eq!(decode::<String>(Some(json!("bare string"))), None);
        assert_eq!(decode::<u32>(Some(json!({"origin_data": "not a number"}))), None);
    }

    #[test]
    fn test_decode_missing_deadline_defaults_to_zero() {
        let record = decode::<u32>(Some(json!({"origin_data": 7}))).unwrap();
        assert_eq!(record, StoredRecord { origin_data: 7, expire_time: 0 });
    }

    #[test]
    fn test_decode_null_value_is_present() {
        let record = decode::<Option<u32>>(Some(json!({"origin_data": null, "expire_time": 9})));
        assert_eq!(record.map(StoredRecord::into_value), Some(None));
    }

    #[test]
    fn test_remaining_below_threshold() {
        let record = StoredRecord::encode((), 3_600, 0);
        assert!(!record.remaining_below_threshold(0, 3_600));
        assert!(record.remaining_below_threshold(1, 3_600));
        assert!(record.remaining_below_threshold(10_000, 3_600));

        let no_deadline = StoredRecord::encode((), 0, 0);
        assert!(!no_deadline.remaining_below_threshold(i64::MAX, 3_600));
    }

    proptest! {
        #[test]
        fn prop_threshold_matches_remaining(
            now in 0i64..2_000_000_000,
            ttl in 1u64..200_000,
            elapsed in 0i64..200_000,
        ) {
            let record = StoredRecord::encode(0u8, ttl, now);
            let later = now + elapsed;
            let remaining = ttl as i64 - elapsed;
            prop_assert_eq!(record.remaining_below_threshold(later, 3_600), remaining < 3_600);
        }
    }
}
