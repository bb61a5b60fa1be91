//! Logger backed by `tracing`

use kcommon_core::VoidResult;
use parking_lot::RwLock;

use crate::level::LogLevel;
use crate::logger::{LogEntry, Logger};

/// Forwards messages to the active `tracing` subscriber
///
/// The logger name becomes the `logger` field of every event. Messages
/// below the logger's own level are dropped before reaching `tracing`.
#[derive(Debug)]
pub struct TracingLogger {
    name: String,
    level: RwLock<LogLevel>,
}

impl TracingLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_level(name, LogLevel::Info)
    }

    pub fn with_level(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level: RwLock::new(level),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, level: LogLevel, message: &str, location: Option<String>) {
        let logger = self.name.as_str();
        let location = location.unwrap_or_default();
        match level {
            LogLevel::Trace => tracing::trace!(logger, %location, "{}", message),
            LogLevel::Debug => tracing::debug!(logger, %location, "{}", message),
            LogLevel::Info => tracing::info!(logger, %location, "{}", message),
            LogLevel::Warning => tracing::warn!(logger, %location, "{}", message),
            LogLevel::Error => tracing::error!(logger, %location, "{}", message),
            LogLevel::Critical => tracing::error!(logger, %location, critical = true, "{}", message),
            LogLevel::Off => {}
        }
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) -> VoidResult {
        if self.is_enabled(level) {
            self.emit(level, message, None);
        }
        Ok(())
    }

    fn log_entry(&self, entry: &LogEntry) -> VoidResult {
        if self.is_enabled(entry.level) {
            let location = entry.location.as_ref().map(ToString::to_string);
            self.emit(entry.level, &entry.message, location);
        }
        Ok(())
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        self.level.read().allows(level)
    }

    fn set_level(&self, level: LogLevel) -> VoidResult {
        *self.level.write() = level;
        Ok(())
    }

    fn level(&self) -> LogLevel {
        *self.level.read()
    }
}
