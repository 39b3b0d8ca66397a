//! Logger backed by the `tracing` crate

use super::traits::Logger;

/// Default logger: forwards every message to `tracing` under the
/// `toolbridge` target, so the host decides formatting and filtering
/// through its own subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "toolbridge", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "toolbridge", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "toolbridge", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "toolbridge", "{}", message);
    }
}
