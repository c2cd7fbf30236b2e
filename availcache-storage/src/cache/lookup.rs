//! Lookup result carrying provenance.
//!
//! `AvailableCache::get` hands back the bare value; `resolve` hands back a
//! [`Lookup`] so callers and tests can tell a fast-path hit from a
//! regeneration or a degraded fallback.

/// Where a returned value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupSource {
    /// Primary tier hit on the fast path.
    Primary,
    /// The producer ran under the generation lock and both tiers were rewritten.
    Regenerated,
    /// Degraded read from the safety-net tier.
    SafetyNet,
    /// Nothing could be served.
    Absent,
}

/// Result of one `AvailableCache::resolve` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    value: Option<T>,
    source: LookupSource,
    alarm_dispatched: bool,
}

impl<T> Lookup<T> {
    pub fn primary(value: T) -> Self {
        Self {
            value: Some(value),
            source: LookupSource::Primary,
            alarm_dispatched: false,
        }
    }

    pub fn regenerated(value: T) -> Self {
        Self {
            value: Some(value),
            source: LookupSource::Regenerated,
            alarm_dispatched: false,
        }
    }

    /// Fallback read; `Absent` when the safety-net tier had nothing either.
    pub fn fallback(value: Option<T>, alarm_dispatched: bool) -> Self {
        let source = if value.is_some() {
            LookupSource::SafetyNet
        } else {
            LookupSource::Absent
        };
        Self {
            value,
            source,
            alarm_dispatched,
        }
    }

    pub fn source(&self) -> LookupSource {
        self.source
    }

    /// Whether this call took the alarm lock and handed a message to the callback.
    pub fn alarm_dispatched(&self) -> bool {
        self.alarm_dispatched
    }

    /// True when the value did not come from the primary tier or a fresh regeneration.
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, LookupSource::SafetyNet | LookupSource::Absent)
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}
