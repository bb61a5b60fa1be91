//! Dependency injection container for kcommon
//!
//! A thread-safe, type-erased service container with singleton, transient
//! and scoped lifetimes, parent/child scopes and a one-way freeze. Every
//! registration, removal, clear and freeze is recorded in a
//! [`kcommon_core::AuditLog`].
//!
//! ```
//! use kcommon_di::{ServiceContainer, ServiceLifetime};
//! use std::sync::Arc;
//!
//! let container = ServiceContainer::new();
//! container
//!     .register_simple_factory(|| Arc::new("Hello, DI!".to_string()), ServiceLifetime::Singleton)
//!     .unwrap();
//! container.freeze();
//!
//! let greeting = container.resolve::<String>().unwrap();
//! assert_eq!(greeting.as_str(), "Hello, DI!");
//! ```

pub mod cell;
pub mod container;
mod entry;
pub mod erased;
pub mod error;
pub mod key;
pub mod provider;
mod resolution;
pub mod service;
pub mod store;

pub use cell::{InitError, InstanceCell};
pub use container::ServiceContainer;
pub use erased::ErasedInstance;
pub use error::{DiError, DiResult};
pub use key::ServiceKey;
pub use provider::ServiceProvider;
pub use service::{ServiceDescriptor, ServiceLifetime};
pub use store::{EntryStore, RegistryFrozen};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        DiError, DiResult, ServiceContainer, ServiceDescriptor, ServiceKey, ServiceLifetime,
        ServiceProvider,
    };
}
