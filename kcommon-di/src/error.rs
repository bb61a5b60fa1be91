//! Error types for the service container

use kcommon_core::{codes as common, ErrorInfo};
use thiserror::Error;

use crate::service::ServiceLifetime;
use crate::store::RegistryFrozen;

/// Module name reported in converted [`ErrorInfo`] values
pub const MODULE: &str = "kcommon-di";

/// Error codes owned by the container (-100 to -199)
pub mod codes {
    pub const SERVICE_NOT_FOUND: i32 = -100;
    pub const CYCLIC_DEPENDENCY: i32 = -101;
    pub const ALREADY_REGISTERED: i32 = -102;
    pub const FACTORY_FAILED: i32 = -103;
    pub const INVALID_LIFETIME: i32 = -104;
    pub const SCOPED_FROM_ROOT: i32 = -105;
}

/// Result type alias for container operations
pub type DiResult<T> = Result<T, DiError>;

/// Errors that can occur during registration or resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// No entry for the key in the container or its parents
    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    /// A factory re-entered a resolution already in progress on this thread
    #[error("Circular dependency detected: {path}")]
    CyclicDependency { path: String },

    /// The key already has an entry in this container
    #[error("Service already registered: {service}")]
    AlreadyRegistered { service: String },

    /// The factory returned an error or panicked
    #[error("Failed to create service {service}: {reason}")]
    FactoryFailed { service: String, reason: String },

    /// A longer-lived service tried to capture a shorter-lived one
    #[error("Invalid service lifetime: cannot resolve {requested} service {service} while constructing {available} service {consumer}")]
    InvalidLifetime {
        service: String,
        requested: ServiceLifetime,
        consumer: String,
        available: ServiceLifetime,
    },

    /// Scoped services need a scope to live in
    #[error("Cannot resolve scoped service {service} from a root container")]
    ScopedFromRoot { service: String },

    /// The container has been frozen
    #[error("Registry is frozen")]
    RegistryFrozen,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The stored instance does not hold the requested type
    #[error("Type mismatch for service {service}")]
    TypeMismatch { service: String },
}

impl DiError {
    /// Numeric code, in the container range or the common range
    pub fn code(&self) -> i32 {
        match self {
            DiError::ServiceNotFound { .. } => codes::SERVICE_NOT_FOUND,
            DiError::CyclicDependency { .. } => codes::CYCLIC_DEPENDENCY,
            DiError::AlreadyRegistered { .. } => codes::ALREADY_REGISTERED,
            DiError::FactoryFailed { .. } => codes::FACTORY_FAILED,
            DiError::InvalidLifetime { .. } => codes::INVALID_LIFETIME,
            DiError::ScopedFromRoot { .. } => codes::SCOPED_FROM_ROOT,
            DiError::RegistryFrozen => common::REGISTRY_FROZEN,
            DiError::InvalidArgument(_) => common::INVALID_ARGUMENT,
            DiError::TypeMismatch { .. } => common::INTERNAL_ERROR,
        }
    }

    pub fn module(&self) -> &'static str {
        MODULE
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DiError::ServiceNotFound { .. })
    }
}

impl From<RegistryFrozen> for DiError {
    fn from(_: RegistryFrozen) -> Self {
        DiError::RegistryFrozen
    }
}

impl From<DiError> for ErrorInfo {
    fn from(err: DiError) -> Self {
        ErrorInfo::new(err.code(), err.to_string(), err.module())
    }
}
