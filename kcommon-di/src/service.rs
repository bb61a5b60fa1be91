//! Service lifetimes and registration descriptors

use std::fmt;

use crate::key::ServiceKey;

/// How many instances a registration produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// A new instance for every resolution
    Transient,
    /// One instance per scope
    Scoped,
    /// One instance for the container that owns the registration
    Singleton,
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceLifetime::Transient => write!(f, "Transient"),
            ServiceLifetime::Scoped => write!(f, "Scoped"),
            ServiceLifetime::Singleton => write!(f, "Singleton"),
        }
    }
}

/// Snapshot of one registration, for introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub key: ServiceKey,
    pub lifetime: ServiceLifetime,
    /// Whether the container-level instance exists. Always false for
    /// transient and scoped registrations.
    pub constructed: bool,
}

impl ServiceDescriptor {
    pub fn service_type_name(&self) -> &'static str {
        self.key.type_name()
    }

    pub fn name(&self) -> Option<&str> {
        self.key.name()
    }
}
