//! Core container implementation

use kcommon_core::{AuditLog, AuditOutcome, RegistryAction, SourceLocation};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info, warn};

use crate::cell::{InitError, InstanceCell};
use crate::entry::{ErasedFactory, ServiceEntry};
use crate::erased::{self, ErasedInstance};
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::provider::{resolve_typed, ServiceProvider};
use crate::resolution::{self, ContainerId};
use crate::service::{ServiceDescriptor, ServiceLifetime};
use crate::store::EntryStore;

/// Scoped instance cache slot, tied to the entry it was built from
struct ScopedSlot {
    entry: Weak<ServiceEntry>,
    cell: Arc<InstanceCell<ErasedInstance>>,
}

struct ContainerInner {
    store: EntryStore<ServiceKey, Arc<ServiceEntry>>,
    scoped: Mutex<HashMap<ServiceKey, ScopedSlot>>,
    parent: Option<Weak<ContainerInner>>,
    audit: Arc<AuditLog>,
}

/// Thread-safe service container
///
/// Cloning yields another handle to the same container. A container made
/// by [`create_scope`](Self::create_scope) is a scope: it has its own
/// entries, its own freeze flag and its own cache of scoped instances, and
/// falls back to its parent for keys it does not hold.
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

impl ServiceContainer {
    /// Create a root container recording into [`AuditLog::global`]
    pub fn new() -> Self {
        Self::with_audit_log(AuditLog::global())
    }

    /// Create a root container recording into `audit`
    pub fn with_audit_log(audit: Arc<AuditLog>) -> Self {
        Self::from_parts(None, audit)
    }

    /// The process-wide container
    pub fn global() -> &'static ServiceContainer {
        static GLOBAL: OnceLock<ServiceContainer> = OnceLock::new();
        GLOBAL.get_or_init(ServiceContainer::new)
    }

    fn from_parts(parent: Option<Weak<ContainerInner>>, audit: Arc<AuditLog>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                store: EntryStore::new(),
                scoped: Mutex::new(HashMap::new()),
                parent,
                audit,
            }),
        }
    }

    /// Create a child scope sharing this container's audit log
    ///
    /// The scope only holds a weak reference to its parent. Once every
    /// handle to the parent is gone, keys the scope does not hold itself
    /// resolve as not found.
    pub fn create_scope(&self) -> ServiceContainer {
        Self::from_parts(
            Some(Arc::downgrade(&self.inner)),
            Arc::clone(&self.inner.audit),
        )
    }

    /// Whether this container was created by [`create_scope`](Self::create_scope)
    pub fn is_scope(&self) -> bool {
        self.inner.parent.is_some()
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.inner.audit
    }

    /// Register a factory for `T`
    ///
    /// Fails with [`DiError::AlreadyRegistered`] if this container already
    /// holds an entry for `T`, and with [`DiError::RegistryFrozen`] once
    /// the container is frozen.
    #[track_caller]
    pub fn register_factory<T, F>(&self, factory: F, lifetime: ServiceLifetime) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn ServiceProvider) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller("ServiceContainer::register_factory");
        let entry = ServiceEntry::new(ServiceKey::of::<T>(), lifetime, erase_factory(factory));
        self.insert_entry(entry, location)
    }

    /// Register a factory for `T` under `name`
    #[track_caller]
    pub fn register_named_factory<T, F>(
        &self,
        name: &str,
        factory: F,
        lifetime: ServiceLifetime,
    ) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn ServiceProvider) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller("ServiceContainer::register_named_factory");
        let key = ServiceKey::named::<T>(name);
        if name.is_empty() {
            return self.reject(
                RegistryAction::RegisterService,
                &key,
                location,
                DiError::InvalidArgument("service name must not be empty".to_string()),
            );
        }
        let entry = ServiceEntry::new(key, lifetime, erase_factory(factory));
        self.insert_entry(entry, location)
    }

    /// Register an infallible factory that ignores the provider
    #[track_caller]
    pub fn register_simple_factory<T, F>(&self, factory: F, lifetime: ServiceLifetime) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller("ServiceContainer::register_simple_factory");
        let entry = ServiceEntry::new(
            ServiceKey::of::<T>(),
            lifetime,
            erase_factory::<T, _>(move |_: &dyn ServiceProvider| Ok(factory())),
        );
        self.insert_entry(entry, location)
    }

    /// Register an already constructed singleton
    #[track_caller]
    pub fn register_instance<T>(&self, instance: Arc<T>) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let location = SourceLocation::caller("ServiceContainer::register_instance");
        let entry = ServiceEntry::with_instance(ServiceKey::of::<T>(), erased::erase(instance));
        self.insert_entry(entry, location)
    }

    /// Register an already constructed singleton under `name`
    #[track_caller]
    pub fn register_named_instance<T>(&self, name: &str, instance: Arc<T>) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let location = SourceLocation::caller("ServiceContainer::register_named_instance");
        let key = ServiceKey::named::<T>(name);
        if name.is_empty() {
            return self.reject(
                RegistryAction::RegisterService,
                &key,
                location,
                DiError::InvalidArgument("service name must not be empty".to_string()),
            );
        }
        let entry = ServiceEntry::with_instance(key, erased::erase(instance));
        self.insert_entry(entry, location)
    }

    fn insert_entry(&self, entry: ServiceEntry, location: SourceLocation) -> DiResult<()> {
        let key = entry.key().clone();
        let lifetime = entry.lifetime();
        let entry = Arc::new(entry);

        let result = self.inner.store.modify(|entries| {
            if entries.contains_key(&key) {
                return Err(DiError::AlreadyRegistered {
                    service: key.to_string(),
                });
            }
            entries.insert(key.clone(), entry);
            Ok(())
        });

        self.record(RegistryAction::RegisterService, &key, location, &result);
        match &result {
            Ok(()) => debug!(service = %key, %lifetime, "service registered"),
            Err(err) => warn!(service = %key, error = %err, "service registration rejected"),
        }
        result
    }

    /// Resolve `T`, constructing it if its lifetime requires
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        resolve_typed(self, &ServiceKey::of::<T>())
    }

    /// Resolve `T` registered under `name`
    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        resolve_typed(self, &ServiceKey::named::<T>(name))
    }

    /// Resolve `T`, or `None` on any failure
    ///
    /// Failures other than a missing registration are logged.
    pub fn resolve_or_null<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Self::ok_or_warn(self.resolve::<T>())
    }

    pub fn resolve_named_or_null<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Option<Arc<T>> {
        Self::ok_or_warn(self.resolve_named::<T>(name))
    }

    fn ok_or_warn<T: ?Sized>(result: DiResult<Arc<T>>) -> Option<Arc<T>> {
        match result {
            Ok(instance) => Some(instance),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                warn!(error = %err, "optional service resolution failed");
                None
            }
        }
    }

    /// Whether `T` is registered here or in a parent
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.has_service(&ServiceKey::of::<T>())
    }

    pub fn is_named_registered<T: ?Sized + 'static>(&self, name: &str) -> bool {
        self.has_service(&ServiceKey::named::<T>(name))
    }

    /// Descriptors of the entries held by this container, excluding parents
    pub fn registered_services(&self) -> Vec<ServiceDescriptor> {
        self.inner
            .store
            .entries()
            .into_iter()
            .map(|(_, entry)| entry.descriptor())
            .collect()
    }

    /// Remove the registration for `T`
    #[track_caller]
    pub fn unregister<T: ?Sized + 'static>(&self) -> DiResult<()> {
        let location = SourceLocation::caller("ServiceContainer::unregister");
        self.remove_entry(ServiceKey::of::<T>(), location)
    }

    /// Remove the registration for `T` under `name`
    #[track_caller]
    pub fn unregister_named<T: ?Sized + 'static>(&self, name: &str) -> DiResult<()> {
        let location = SourceLocation::caller("ServiceContainer::unregister_named");
        self.remove_entry(ServiceKey::named::<T>(name), location)
    }

    fn remove_entry(&self, key: ServiceKey, location: SourceLocation) -> DiResult<()> {
        let result = self.inner.store.modify(|entries| {
            entries
                .remove(&key)
                .ok_or_else(|| DiError::ServiceNotFound {
                    service: key.to_string(),
                })
        });
        self.record(RegistryAction::UnregisterService, &key, location, &result);

        match result {
            Ok(removed) => {
                // Cached instances may resolve from this container when dropped
                let slot = self.inner.scoped.lock().remove(&key);
                drop(slot);
                drop(removed);
                debug!(service = %key, "service unregistered");
                Ok(())
            }
            Err(err) => {
                warn!(service = %key, error = %err, "service unregistration rejected");
                Err(err)
            }
        }
    }

    /// Remove every local entry and scoped instance
    ///
    /// On a frozen container nothing is removed and `Ok(())` is returned;
    /// the rejected attempt still appears in the audit log.
    #[track_caller]
    pub fn clear(&self) -> DiResult<()> {
        let location = SourceLocation::caller("ServiceContainer::clear");
        match self.inner.store.drain() {
            Ok(removed) => {
                let scoped = std::mem::take(&mut *self.inner.scoped.lock());
                self.inner.audit.record(
                    RegistryAction::ClearServices,
                    "",
                    location,
                    AuditOutcome::Success,
                );
                debug!(entries = removed.len(), "service container cleared");
                drop(scoped);
                drop(removed);
            }
            Err(frozen) => {
                self.inner.audit.record(
                    RegistryAction::ClearServices,
                    "",
                    location,
                    AuditOutcome::failure(frozen.to_string()),
                );
                warn!("clear ignored on frozen service container");
            }
        }
        Ok(())
    }

    /// Freeze the container. Later registrations and removals fail;
    /// resolution is unaffected. Repeated calls do nothing.
    #[track_caller]
    pub fn freeze(&self) {
        let location = SourceLocation::caller("ServiceContainer::freeze");
        if self.inner.store.freeze() {
            self.inner.audit.record(
                RegistryAction::FreezeServiceContainer,
                "",
                location,
                AuditOutcome::Success,
            );
            info!(services = self.inner.store.len(), "service container frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.store.is_frozen()
    }

    fn record<T>(
        &self,
        action: RegistryAction,
        key: &ServiceKey,
        location: SourceLocation,
        result: &DiResult<T>,
    ) {
        self.inner
            .audit
            .record(action, key.to_string(), location, AuditOutcome::of(result));
    }

    fn reject(
        &self,
        action: RegistryAction,
        key: &ServiceKey,
        location: SourceLocation,
        err: DiError,
    ) -> DiResult<()> {
        let result: DiResult<()> = Err(err);
        self.record(action, key, location, &result);
        result
    }

    /// Find the entry for `key` along the parent chain, with its owner
    fn find_entry(&self, key: &ServiceKey) -> DiResult<(Arc<ContainerInner>, Arc<ServiceEntry>)> {
        let mut current = Arc::clone(&self.inner);
        loop {
            if let Some(entry) = current.store.get(key) {
                return Ok((current, entry));
            }
            let parent = current.parent.as_ref().and_then(Weak::upgrade);
            match parent {
                Some(parent) => current = parent,
                None => {
                    return Err(DiError::ServiceNotFound {
                        service: key.to_string(),
                    })
                }
            }
        }
    }

    fn resolve_entry(&self, key: &ServiceKey) -> DiResult<ErasedInstance> {
        let (owner, entry) = self.find_entry(key)?;

        if entry.lifetime() == ServiceLifetime::Scoped && !self.is_scope() {
            return Err(DiError::ScopedFromRoot {
                service: key.to_string(),
            });
        }

        let holder = match entry.lifetime() {
            ServiceLifetime::Singleton => ContainerId::of(&owner),
            _ => ContainerId::of(&self.inner),
        };
        let _guard = resolution::enter(key, entry.lifetime(), holder)?;
        match entry.lifetime() {
            ServiceLifetime::Transient => entry.construct(self),
            ServiceLifetime::Singleton => {
                let owner = ServiceContainer { inner: owner };
                let result = entry
                    .instance()
                    .get_or_try_init(|| entry.construct(&owner));
                Self::settle(key, result)
            }
            ServiceLifetime::Scoped => {
                let cell = self.scoped_cell(key, &entry);
                let result = cell.get_or_try_init(|| entry.construct(self));
                Self::settle(key, result)
            }
        }
    }

    fn scoped_cell(
        &self,
        key: &ServiceKey,
        entry: &Arc<ServiceEntry>,
    ) -> Arc<InstanceCell<ErasedInstance>> {
        let (cell, stale) = {
            let mut slots = self.inner.scoped.lock();
            if let Some(slot) = slots.get(key) {
                if std::ptr::eq(slot.entry.as_ptr(), Arc::as_ptr(entry)) {
                    return Arc::clone(&slot.cell);
                }
            }
            let cell = Arc::new(InstanceCell::new());
            let stale = slots.insert(
                key.clone(),
                ScopedSlot {
                    entry: Arc::downgrade(entry),
                    cell: Arc::clone(&cell),
                },
            );
            (cell, stale)
        };
        // The replaced instance is dropped outside the lock
        drop(stale);
        cell
    }

    fn settle(
        key: &ServiceKey,
        result: Result<ErasedInstance, InitError<DiError>>,
    ) -> DiResult<ErasedInstance> {
        result.map_err(|err| match err {
            InitError::Failed(err) => err,
            InitError::Reentered => DiError::CyclicDependency {
                path: format!("{key} -> {key}"),
            },
        })
    }
}

impl ServiceProvider for ServiceContainer {
    fn resolve_erased(&self, key: &ServiceKey) -> DiResult<ErasedInstance> {
        self.resolve_entry(key)
    }

    fn has_service(&self, key: &ServiceKey) -> bool {
        self.find_entry(key).is_ok()
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("services", &self.inner.store.len())
            .field("scope", &self.is_scope())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

fn erase_factory<T, F>(factory: F) -> ErasedFactory
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&dyn ServiceProvider) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(move |provider: &dyn ServiceProvider| factory(provider).map(erased::erase::<T>))
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
