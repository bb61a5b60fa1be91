//! Logger capability interface

use chrono::{DateTime, Utc};
use kcommon_core::{SourceLocation, VoidResult};

use crate::level::LogLevel;

/// A single log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            location: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Anything that can accept log messages
///
/// Implementations must be thread-safe; the registry hands out shared
/// references that are used from any thread.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str) -> VoidResult;

    /// Log a complete entry. The default forwards level and message.
    fn log_entry(&self, entry: &LogEntry) -> VoidResult {
        self.log(entry.level, &entry.message)
    }

    /// Log with the caller's source location attached
    #[track_caller]
    fn log_here(&self, level: LogLevel, message: &str) -> VoidResult {
        let entry = LogEntry::new(level, message).with_location(SourceLocation::caller("log_here"));
        self.log_entry(&entry)
    }

    fn is_enabled(&self, level: LogLevel) -> bool;

    fn set_level(&self, level: LogLevel) -> VoidResult;

    fn level(&self) -> LogLevel;

    fn flush(&self) -> VoidResult {
        Ok(())
    }
}
