//! Diagnostics probe.
//!
//! When a run has `probe` enabled, every decision point of the engine emits a
//! DEBUG record through the [`CacheLogger`], tagged with the call id so the
//! records of one `get` can be stitched together. Disabled probes build no
//! context at all.

use availcache_core::{CallId, RunConfig, ALARM_LOCK_INTERVAL};
use serde_json::{json, Value};
use tracing::Level;

use super::keys::DerivedKeys;
use super::logger::CacheLogger;

/// Decision points reported by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeEvent {
    /// Run configuration snapshot at call entry.
    Initialize,
    /// A tier record was read.
    GetCacheData,
    /// Generation lock acquisition attempt.
    AddGenerateLock,
    /// A tier record was written.
    SetCacheData,
    /// Generation lock release.
    ClearGenerateLock,
    /// Alarm lock acquisition attempt.
    AddAlarmLock,
    /// The alarm callback accepted a message.
    SendingAlarms,
}

impl ProbeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeEvent::Initialize => "initialize",
            ProbeEvent::GetCacheData => "get_cache_data",
            ProbeEvent::AddGenerateLock => "add_generate_lock",
            ProbeEvent::SetCacheData => "set_cache_data",
            ProbeEvent::ClearGenerateLock => "clear_generate_lock",
            ProbeEvent::AddAlarmLock => "add_alarm_lock",
            ProbeEvent::SendingAlarms => "sending_alarms",
        }
    }
}

/// Per-call diagnostics emitter.
pub struct Probe<'a> {
    enabled: bool,
    call_id: CallId,
    logger: &'a dyn CacheLogger,
}

impl<'a> Probe<'a> {
    pub fn new(enabled: bool, call_id: CallId, logger: &'a dyn CacheLogger) -> Self {
        Self {
            enabled,
            call_id,
            logger,
        }
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Emit `event`; `context` is only evaluated when the probe is enabled.
    pub fn record<F>(&self, event: ProbeEvent, context: F)
    where
        F: FnOnce() -> Value,
    {
        if !self.enabled {
            return;
        }
        let mut context = context();
        if let Value::Object(fields) = &mut context {
            fields.insert("id".to_string(), json!(self.call_id.as_str()));
        } else {
            context = json!({ "id": self.call_id.as_str(), "data": context });
        }
        self.logger.log(Level::DEBUG, event.as_str(), &context);
    }

    /// Emit the configuration snapshot for this call.
    pub fn initialize(&self, keys: &DerivedKeys, config: &RunConfig) {
        self.record(ProbeEvent::Initialize, || {
            json!({
                "l1_key": keys.l1(),
                "l2_key": keys.l2(),
                "generate_lock_key": keys.generate_lock(),
                "alarm_lock_key": keys.alarm_lock(),
                "l1_expire_interval": config.l1_expire_interval,
                "l2_expire_interval": config.l2_expire_interval,
                "cache_lock_interval": config.cache_lock_interval,
                "alarm_lock_interval": ALARM_LOCK_INTERVAL,
                "alarm": config.alarm.is_some(),
                "probe": config.probe,
            })
        });
    }
}
