//! Logging seam.
//!
//! The engines report through [`CacheLogger`] instead of calling `tracing`
//! directly so deployments can route cache diagnostics elsewhere and tests can
//! capture them. [`TracingLogger`] is the default sink.

use serde_json::Value;
use tracing::Level;

/// Structured log sink used by the cache engines.
pub trait CacheLogger: Send + Sync {
    /// Emit `message` at `level` with a JSON `context`.
    fn log(&self, level: Level, message: &str, context: &Value);
}

/// Forwards records to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl CacheLogger for TracingLogger {
    fn log(&self, level: Level, message: &str, context: &Value) {
        if level == Level::ERROR {
            tracing::error!(context = %context, "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(context = %context, "{}", message);
        } else if level == Level::INFO {
            tracing::info!(context = %context, "{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!(context = %context, "{}", message);
        } else {
            tracing::trace!(context = %context, "{}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tracing_logger_accepts_every_level() {
        let logger = TracingLogger;
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            logger.log(level, "probe", &json!({"key": "k"}));
        }
    }
}
