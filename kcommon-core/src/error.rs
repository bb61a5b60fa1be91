//! Error types shared by every kcommon crate
//!
//! All fallible operations report failures as an [`ErrorInfo`]: a numeric
//! code, a human readable message, the module that produced it and optional
//! free-form details. Crate specific error enums convert into it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes in the common range (-1 to -99)
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_ARGUMENT: i32 = -1;
    pub const NOT_FOUND: i32 = -2;
    pub const PERMISSION_DENIED: i32 = -3;
    pub const TIMEOUT: i32 = -4;
    pub const CANCELLED: i32 = -5;
    pub const NOT_INITIALIZED: i32 = -6;
    pub const ALREADY_EXISTS: i32 = -7;
    pub const OUT_OF_MEMORY: i32 = -8;
    pub const IO_ERROR: i32 = -9;
    pub const NETWORK_ERROR: i32 = -10;
    /// Mutation attempted on a frozen registry
    pub const REGISTRY_FROZEN: i32 = -11;
    pub const INTERNAL_ERROR: i32 = -99;

    /// Returns the canonical message for a common error code
    pub fn message(code: i32) -> &'static str {
        match code {
            SUCCESS => "Success",
            INVALID_ARGUMENT => "Invalid argument",
            NOT_FOUND => "Not found",
            PERMISSION_DENIED => "Permission denied",
            TIMEOUT => "Timeout",
            CANCELLED => "Cancelled",
            NOT_INITIALIZED => "Not initialized",
            ALREADY_EXISTS => "Already exists",
            OUT_OF_MEMORY => "Out of memory",
            IO_ERROR => "I/O error",
            NETWORK_ERROR => "Network error",
            REGISTRY_FROZEN => "Registry is frozen",
            INTERNAL_ERROR => "Internal error",
            _ => "Unknown error",
        }
    }
}

/// Structured error carried by [`Result`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code (see [`codes`])
    pub code: i32,
    /// Human readable description
    pub message: String,
    /// Module that produced the error
    pub module: String,
    /// Optional extra context
    pub details: Option<String>,
}

impl ErrorInfo {
    /// Create a new error without details
    pub fn new(code: i32, message: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            module: module.into(),
            details: None,
        }
    }

    /// Attach details to the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Whether this error reports a frozen registry
    pub fn is_frozen(&self) -> bool {
        self.code == codes::REGISTRY_FROZEN
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{} (code {})", self.message, self.code)?;
        } else {
            write!(f, "[{}] {} (code {})", self.module, self.message, self.code)?;
        }
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorInfo {}

/// Result type alias used across kcommon
pub type Result<T> = std::result::Result<T, ErrorInfo>;

/// Result of an operation that produces no value
pub type VoidResult = Result<()>;

/// Build an `Err` with the given code, message and module
pub fn make_error<T>(code: i32, message: impl Into<String>, module: impl Into<String>) -> Result<T> {
    Err(ErrorInfo::new(code, message, module))
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
