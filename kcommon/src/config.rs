//! Runtime configuration
//!
//! Configuration is read from TOML or JSON and can be overridden from the
//! environment. Every section and field is optional; missing values take
//! their defaults.
//!
//! ```toml
//! [audit]
//! enabled = true
//!
//! [freeze]
//! services = true
//! loggers = true
//!
//! [logging]
//! level = "warn"
//! filter = "kcommon_di=debug"
//!
//! [shutdown]
//! timeout_ms = 5000
//! ```

use kcommon_core::{codes, ErrorInfo};
use kcommon_logger::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding [`AuditConfig::enabled`]
pub const ENV_AUDIT_ENABLED: &str = "KCOMMON_AUDIT_ENABLED";
/// Environment variable overriding [`FreezeConfig::services`]
pub const ENV_FREEZE_SERVICES: &str = "KCOMMON_FREEZE_SERVICES";
/// Environment variable overriding [`FreezeConfig::loggers`]
pub const ENV_FREEZE_LOGGERS: &str = "KCOMMON_FREEZE_LOGGERS";
/// Environment variable overriding [`LoggingConfig::level`]
pub const ENV_LOG_LEVEL: &str = "KCOMMON_LOG_LEVEL";
/// Environment variable overriding [`LoggingConfig::filter`]
pub const ENV_LOG_FILTER: &str = "KCOMMON_LOG_FILTER";
/// Environment variable overriding [`ShutdownConfig::timeout_ms`]
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "KCOMMON_SHUTDOWN_TIMEOUT_MS";

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for ErrorInfo {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Io { .. } => codes::IO_ERROR,
            _ => codes::INVALID_ARGUMENT,
        };
        ErrorInfo::new(code, err.to_string(), "kcommon::config")
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    pub audit: AuditConfig,
    pub freeze: FreezeConfig,
    pub logging: LoggingConfig,
    pub shutdown: ShutdownConfig,
}

/// Registry audit log settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Which registries are frozen once initialization completes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    pub services: bool,
    pub loggers: bool,
}

/// `tracing` subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// `EnvFilter` directives; replaces `level` when set
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            filter: None,
        }
    }
}

impl LoggingConfig {
    /// Filter directives handed to the subscriber
    pub fn directives(&self) -> String {
        if let Some(filter) = &self.filter {
            return filter.clone();
        }
        match self.level {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
            LogLevel::Off => "off",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Budget shared by all shutdown hooks
    pub timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CommonConfig {
    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load configuration from JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Load a `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            Some("json") => Self::from_json(&contents),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_AUDIT_ENABLED) {
            self.audit.enabled = parse_bool(ENV_AUDIT_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_FREEZE_SERVICES) {
            self.freeze.services = parse_bool(ENV_FREEZE_SERVICES, &value)?;
        }
        if let Some(value) = lookup(ENV_FREEZE_LOGGERS) {
            self.freeze.loggers = parse_bool(ENV_FREEZE_LOGGERS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = value.parse().map_err(|_| invalid(ENV_LOG_LEVEL, &value))?;
        }
        if let Some(value) = lookup(ENV_LOG_FILTER) {
            self.logging.filter = Some(value).filter(|filter| !filter.is_empty());
        }
        if let Some(value) = lookup(ENV_SHUTDOWN_TIMEOUT_MS) {
            self.shutdown.timeout_ms = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_SHUTDOWN_TIMEOUT_MS, &value))?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
