//! Service provider interface handed to factories

use std::sync::Arc;

use crate::erased::{self, ErasedInstance};
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;

/// Object-safe view of a container used during construction
///
/// Factories receive `&dyn ServiceProvider` and resolve their own
/// dependencies through the typed helpers on `dyn ServiceProvider`.
pub trait ServiceProvider: Send + Sync {
    /// Resolve the instance registered under `key`
    fn resolve_erased(&self, key: &ServiceKey) -> DiResult<ErasedInstance>;

    /// Whether `key` is registered here or in a parent
    fn has_service(&self, key: &ServiceKey) -> bool;
}

impl dyn ServiceProvider + '_ {
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        resolve_typed(self, &ServiceKey::of::<T>())
    }

    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        resolve_typed(self, &ServiceKey::named::<T>(name))
    }

    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.has_service(&ServiceKey::of::<T>())
    }
}

pub(crate) fn resolve_typed<T: ?Sized + Send + Sync + 'static>(
    provider: &(impl ServiceProvider + ?Sized),
    key: &ServiceKey,
) -> DiResult<Arc<T>> {
    let instance = provider.resolve_erased(key)?;
    erased::downcast::<T>(&instance).ok_or_else(|| DiError::TypeMismatch {
        service: key.to_string(),
    })
}
