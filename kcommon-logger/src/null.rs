//! Null Object logger

use kcommon_core::VoidResult;

use crate::level::LogLevel;
use crate::logger::{LogEntry, Logger};

/// Logger that accepts and discards everything
///
/// Returned by the registry when no real logger is registered, so callers
/// never have to check for an absent logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _message: &str) -> VoidResult {
        Ok(())
    }

    fn log_entry(&self, _entry: &LogEntry) -> VoidResult {
        Ok(())
    }

    fn is_enabled(&self, _level: LogLevel) -> bool {
        false
    }

    fn set_level(&self, _level: LogLevel) -> VoidResult {
        Ok(())
    }

    fn level(&self) -> LogLevel {
        LogLevel::Off
    }
}
