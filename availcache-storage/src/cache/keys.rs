//! Derived store keys for one logical cache entry.
//!
//! Every base key fans out into four physical keys by fixed suffixing. The
//! base key is used verbatim: uniqueness is the caller's job, and nothing is
//! hashed or escaped.

/// Suffix of the primary tier record.
pub const L1_CACHE_KEY_SUFFIX: &str = "_l1_cache";
/// Suffix of the safety-net tier record.
pub const L2_CACHE_KEY_SUFFIX: &str = "_l2_cache";
/// Suffix of the generation lock.
pub const GENERATE_LOCK_SUFFIX: &str = "_generate_lock";
/// Suffix of the alarm de-duplication lock.
pub const ALARM_LOCK_SUFFIX: &str = "_alarm_lock";

/// The four keys belonging to a base key.
///
/// Fields are private so the set can only come from [`DerivedKeys::new`] and
/// always stays consistent with its base key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivedKeys {
    base: String,
    l1: String,
    l2: String,
    generate_lock: String,
    alarm_lock: String,
}

impl DerivedKeys {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            l1: format!("{base}{L1_CACHE_KEY_SUFFIX}"),
            l2: format!("{base}{L2_CACHE_KEY_SUFFIX}"),
            generate_lock: format!("{base}{GENERATE_LOCK_SUFFIX}"),
            alarm_lock: format!("{base}{ALARM_LOCK_SUFFIX}"),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Primary tier record key.
    pub fn l1(&self) -> &str {
        &self.l1
    }

    /// Safety-net tier record key.
    pub fn l2(&self) -> &str {
        &self.l2
    }

    pub fn generate_lock(&self) -> &str {
        &self.generate_lock
    }

    pub fn alarm_lock(&self) -> &str {
        &self.alarm_lock
    }
}
