//! Audit event types

use crate::source_location::SourceLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of registry mutation being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryAction {
    RegisterLogger,
    UnregisterLogger,
    SetDefaultLogger,
    /// Lazy logger factory registration
    RegisterFactory,
    SetDefaultFactory,
    ClearLoggers,
    FreezeLoggerRegistry,
    RegisterService,
    UnregisterService,
    ClearServices,
    FreezeServiceContainer,
}

impl RegistryAction {
    pub const ALL: [RegistryAction; 11] = [
        RegistryAction::RegisterLogger,
        RegistryAction::UnregisterLogger,
        RegistryAction::SetDefaultLogger,
        RegistryAction::RegisterFactory,
        RegistryAction::SetDefaultFactory,
        RegistryAction::ClearLoggers,
        RegistryAction::FreezeLoggerRegistry,
        RegistryAction::RegisterService,
        RegistryAction::UnregisterService,
        RegistryAction::ClearServices,
        RegistryAction::FreezeServiceContainer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryAction::RegisterLogger => "register_logger",
            RegistryAction::UnregisterLogger => "unregister_logger",
            RegistryAction::SetDefaultLogger => "set_default_logger",
            RegistryAction::RegisterFactory => "register_factory",
            RegistryAction::SetDefaultFactory => "set_default_factory",
            RegistryAction::ClearLoggers => "clear_loggers",
            RegistryAction::FreezeLoggerRegistry => "freeze_logger_registry",
            RegistryAction::RegisterService => "register_service",
            RegistryAction::UnregisterService => "unregister_service",
            RegistryAction::ClearServices => "clear_services",
            RegistryAction::FreezeServiceContainer => "freeze_service_container",
        }
    }
}

impl fmt::Display for RegistryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the mutation being recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    /// Rejected or failed, with the message returned to the caller
    Failure(String),
}

impl AuditOutcome {
    /// Derive the outcome from an operation result
    pub fn of<T, E: fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => AuditOutcome::Success,
            Err(err) => AuditOutcome::Failure(err.to_string()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        AuditOutcome::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuditOutcome::Success)
    }
}

/// A single appended audit record
///
/// Records are cloned out of the log; edits to a clone never reach the log
/// and are detected by [`verify_events`](super::verify_events).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// Position in the log, starting at zero
    pub sequence: u64,
    pub action: RegistryAction,
    /// Service type or logger name; empty for clear and freeze
    pub target_name: String,
    pub location: SourceLocation,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Present exactly when `success` is false
    pub error_message: Option<String>,
    /// Hex SHA-256 chained over the previous record
    pub digest: String,
}

impl RegistryEvent {
    pub fn file(&self) -> &str {
        &self.location.file
    }

    pub fn line(&self) -> u32 {
        self.location.line
    }

    pub fn function(&self) -> &str {
        &self.location.function
    }
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} on '{}' at {}",
            self.sequence,
            self.timestamp.to_rfc3339(),
            self.action,
            self.target_name,
            self.location
        )?;
        match &self.error_message {
            Some(message) => write!(f, " failed: {}", message),
            None => Ok(()),
        }
    }
}
