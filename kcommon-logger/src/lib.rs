//! Logger interface and registry for kcommon
//!
//! [`Logger`] is the capability every logging backend implements.
//! [`LoggerRegistry`] keeps named loggers plus a default one and hands out
//! the shared [`NullLogger`] whenever nothing real is registered.
//!
//! ```
//! use kcommon_logger::{LogLevel, Logger, LoggerRegistry, TracingLogger};
//! use std::sync::Arc;
//!
//! let registry = LoggerRegistry::new();
//! registry
//!     .register_logger("network", Arc::new(TracingLogger::new("network")))
//!     .unwrap();
//! registry.freeze();
//!
//! registry.get_logger("network").log(LogLevel::Info, "ready").unwrap();
//! // Unknown names get the Null Object, never nothing.
//! registry.get_logger("missing").log(LogLevel::Error, "discarded").unwrap();
//! ```

pub mod level;
pub mod logger;
pub mod null;
pub mod registry;
pub mod tracing_logger;

use std::sync::Arc;

pub use level::{LogLevel, ParseLevelError};
pub use logger::{LogEntry, Logger};
pub use null::NullLogger;
pub use registry::{LoggerFactory, LoggerRegistry};
pub use tracing_logger::TracingLogger;

/// Default logger of the global registry
pub fn default_logger() -> Arc<dyn Logger> {
    LoggerRegistry::global().get_default_logger()
}

/// Named logger of the global registry
pub fn logger(name: &str) -> Arc<dyn Logger> {
    LoggerRegistry::global().get_logger(name)
}
