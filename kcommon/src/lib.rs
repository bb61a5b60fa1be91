//! kcommon: registry runtime for service and logger wiring
//!
//! This crate ties together the building blocks:
//!
//! - [`kcommon_core`]: `ErrorInfo`/`Result`, freeze guard and the audit log
//! - [`kcommon_di`]: the type-erased service container
//! - [`kcommon_logger`]: the logger registry with its Null Object fallback
//!
//! and adds file/environment [`config`] plus a [`Bootstrapper`] that wires
//! the registries in a fixed order and freezes them once startup is done.
//!
//! ```
//! use kcommon::prelude::*;
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 {
//!         42
//!     }
//! }
//!
//! let mut boot = Bootstrapper::with_registries(ServiceContainer::new(), LoggerRegistry::new())
//!     .with_auto_freeze(true, true)
//!     .add_registration("clock", |services| {
//!         services.register_instance::<dyn Clock>(Arc::new(FixedClock))?;
//!         Ok(())
//!     });
//! boot.initialize().unwrap();
//!
//! assert!(boot.services().is_frozen());
//! assert_eq!(boot.services().resolve::<dyn Clock>().unwrap().now(), 42);
//! ```

pub mod bootstrap;
pub mod config;
pub mod telemetry;

pub use bootstrap::{Bootstrapper, InitCallback, RegistrationStep, ShutdownHook};
pub use config::{
    AuditConfig, CommonConfig, ConfigError, FreezeConfig, LoggingConfig, ShutdownConfig,
};
pub use telemetry::init_tracing;

pub use kcommon_core;
pub use kcommon_di;
pub use kcommon_logger;

/// Common imports
pub mod prelude {
    pub use crate::bootstrap::Bootstrapper;
    pub use crate::config::CommonConfig;
    pub use kcommon_core::{codes, ErrorInfo, VoidResult};
    pub use kcommon_di::prelude::*;
    pub use kcommon_logger::{LogLevel, Logger, LoggerRegistry, NullLogger, TracingLogger};
}
