//! Named and default logger registry
//!
//! One default slot plus any number of named slots, each holding either a
//! ready logger or a factory that builds one on first use. Lookups never
//! come back empty: a missing or failed slot yields the shared
//! [`NullLogger`]. Mutations share the freeze and audit machinery of the
//! service container.

use kcommon_core::{
    codes, AuditLog, AuditOutcome, ErrorInfo, RegistryAction, Result, SourceLocation, VoidResult,
};
use kcommon_di::{EntryStore, InitError, InstanceCell, RegistryFrozen};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::logger::Logger;
use crate::null::NullLogger;

/// Module name reported in registry errors
pub const MODULE: &str = "kcommon-logger";

/// Builds a logger on first lookup
pub type LoggerFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Logger>> + Send + Sync>;

/// Audit target used for the default slot
const DEFAULT_TARGET: &str = "default";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
enum RegistryError {
    #[error("Logger name must not be empty")]
    EmptyName,

    #[error("Logger already constructed: {0}")]
    AlreadyConstructed(String),

    #[error("Registry is frozen")]
    Frozen,
}

impl From<RegistryFrozen> for RegistryError {
    fn from(_: RegistryFrozen) -> Self {
        RegistryError::Frozen
    }
}

impl From<RegistryError> for ErrorInfo {
    fn from(err: RegistryError) -> Self {
        let code = match err {
            RegistryError::EmptyName => codes::INVALID_ARGUMENT,
            RegistryError::AlreadyConstructed(_) => codes::ALREADY_EXISTS,
            RegistryError::Frozen => codes::REGISTRY_FROZEN,
        };
        ErrorInfo::new(code, err.to_string(), MODULE)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum Slot {
    Default,
    Named(String),
}

impl Slot {
    fn named(name: &str) -> Self {
        Slot::Named(name.to_string())
    }
}

struct PendingLogger {
    factory: LoggerFactory,
    logger: InstanceCell<Arc<dyn Logger>>,
}

impl PendingLogger {
    fn new(factory: LoggerFactory) -> Self {
        Self {
            factory,
            logger: InstanceCell::new(),
        }
    }

    fn build(&self) -> anyhow::Result<Arc<dyn Logger>> {
        let factory = &self.factory;
        match panic::catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("logger factory panicked")),
        }
    }
}

#[derive(Clone)]
enum LoggerEntry {
    Ready(Arc<dyn Logger>),
    Pending(Arc<PendingLogger>),
}

impl LoggerEntry {
    fn is_constructed(&self) -> bool {
        match self {
            LoggerEntry::Ready(_) => true,
            LoggerEntry::Pending(pending) => pending.logger.is_initialized(),
        }
    }
}

struct RegistryInner {
    store: EntryStore<Slot, LoggerEntry>,
    audit: Arc<AuditLog>,
}

/// Thread-safe registry of named loggers and one default logger
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct LoggerRegistry {
    inner: Arc<RegistryInner>,
}

impl LoggerRegistry {
    /// Create a registry recording into [`AuditLog::global`]
    pub fn new() -> Self {
        Self::with_audit_log(AuditLog::global())
    }

    /// Create a registry recording into `audit`
    pub fn with_audit_log(audit: Arc<AuditLog>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store: EntryStore::new(),
                audit,
            }),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static LoggerRegistry {
        static GLOBAL: OnceLock<LoggerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(LoggerRegistry::new)
    }

    /// The shared Null Object logger
    pub fn null_logger() -> Arc<dyn Logger> {
        static NULL: OnceLock<Arc<dyn Logger>> = OnceLock::new();
        Arc::clone(NULL.get_or_init(|| Arc::new(NullLogger)))
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.inner.audit
    }

    /// Register `logger` under `name`, replacing any logger or factory
    /// already there
    #[track_caller]
    pub fn register_logger(&self, name: &str, logger: Arc<dyn Logger>) -> VoidResult {
        let location = SourceLocation::caller("LoggerRegistry::register_logger");
        let result = if name.is_empty() {
            Err(RegistryError::EmptyName)
        } else {
            self.inner.store.modify(|entries| {
                Ok(entries.insert(Slot::named(name), LoggerEntry::Ready(logger)))
            })
        };
        self.finish(RegistryAction::RegisterLogger, name, location, result)
    }

    /// Register a factory building the logger for `name` on first lookup
    ///
    /// Replaces a pending factory, but fails once a logger has been
    /// constructed under that name.
    #[track_caller]
    pub fn register_factory<F>(&self, name: &str, factory: F) -> VoidResult
    where
        F: Fn() -> anyhow::Result<Arc<dyn Logger>> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller("LoggerRegistry::register_factory");
        let result = if name.is_empty() {
            Err(RegistryError::EmptyName)
        } else {
            self.install_factory(Slot::named(name), name, Arc::new(factory))
        };
        self.finish(RegistryAction::RegisterFactory, name, location, result)
    }

    /// Logger registered under `name`, or the Null Object
    pub fn get_logger(&self, name: &str) -> Arc<dyn Logger> {
        self.lookup(&Slot::named(name), name)
    }

    /// Remove the logger or factory registered under `name`. Removing an
    /// unknown name succeeds.
    #[track_caller]
    pub fn unregister_logger(&self, name: &str) -> VoidResult {
        let location = SourceLocation::caller("LoggerRegistry::unregister_logger");
        let result = self
            .inner
            .store
            .modify(|entries| Ok(entries.remove(&Slot::named(name))));
        self.finish(RegistryAction::UnregisterLogger, name, location, result)
    }

    /// Replace the default logger
    #[track_caller]
    pub fn set_default_logger(&self, logger: Arc<dyn Logger>) -> VoidResult {
        let location = SourceLocation::caller("LoggerRegistry::set_default_logger");
        let result = self
            .inner
            .store
            .modify(|entries| Ok(entries.insert(Slot::Default, LoggerEntry::Ready(logger))));
        self.finish(RegistryAction::SetDefaultLogger, DEFAULT_TARGET, location, result)
    }

    /// Register a factory for the default logger
    ///
    /// Fails once the default logger has been constructed.
    #[track_caller]
    pub fn set_default_factory<F>(&self, factory: F) -> VoidResult
    where
        F: Fn() -> anyhow::Result<Arc<dyn Logger>> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller("LoggerRegistry::set_default_factory");
        let result = self.install_factory(Slot::Default, DEFAULT_TARGET, Arc::new(factory));
        self.finish(RegistryAction::SetDefaultFactory, DEFAULT_TARGET, location, result)
    }

    /// The default logger, or the Null Object
    pub fn get_default_logger(&self) -> Arc<dyn Logger> {
        self.lookup(&Slot::Default, DEFAULT_TARGET)
    }

    /// Whether `name` has a logger or pending factory
    pub fn has_logger(&self, name: &str) -> bool {
        !name.is_empty() && self.inner.store.contains(&Slot::named(name))
    }

    /// Whether a default logger or default factory is set
    pub fn has_default_logger(&self) -> bool {
        self.inner.store.contains(&Slot::Default)
    }

    /// Names with a logger or pending factory, sorted
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .store
            .entries()
            .into_iter()
            .filter_map(|(slot, _)| match slot {
                Slot::Named(name) => Some(name),
                Slot::Default => None,
            })
            .collect();
        names.sort();
        names
    }

    /// Number of named loggers and pending factories
    pub fn size(&self) -> usize {
        self.logger_names().len()
    }

    /// Remove every logger, factory and the default
    ///
    /// On a frozen registry nothing is removed and `Ok(())` is returned;
    /// the rejected attempt still appears in the audit log.
    #[track_caller]
    pub fn clear(&self) -> VoidResult {
        let location = SourceLocation::caller("LoggerRegistry::clear");
        match self.inner.store.drain() {
            Ok(removed) => {
                self.record(RegistryAction::ClearLoggers, "", location, AuditOutcome::Success);
                debug!(loggers = removed.len(), "logger registry cleared");
            }
            Err(frozen) => {
                self.record(
                    RegistryAction::ClearLoggers,
                    "",
                    location,
                    AuditOutcome::failure(frozen.to_string()),
                );
                warn!("clear ignored on frozen logger registry");
            }
        }
        Ok(())
    }

    /// Freeze the registry. Repeated calls do nothing.
    #[track_caller]
    pub fn freeze(&self) {
        let location = SourceLocation::caller("LoggerRegistry::freeze");
        if self.inner.store.freeze() {
            self.record(
                RegistryAction::FreezeLoggerRegistry,
                "",
                location,
                AuditOutcome::Success,
            );
            info!(loggers = self.size(), "logger registry frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.store.is_frozen()
    }

    fn install_factory(
        &self,
        slot: Slot,
        target: &str,
        factory: LoggerFactory,
    ) -> std::result::Result<Option<LoggerEntry>, RegistryError> {
        let pending = LoggerEntry::Pending(Arc::new(PendingLogger::new(factory)));
        self.inner.store.modify(|entries: &mut HashMap<Slot, LoggerEntry>| {
            if entries.get(&slot).is_some_and(LoggerEntry::is_constructed) {
                return Err(RegistryError::AlreadyConstructed(target.to_string()));
            }
            Ok(entries.insert(slot, pending))
        })
    }

    fn lookup(&self, slot: &Slot, target: &str) -> Arc<dyn Logger> {
        let entry = match self.inner.store.get(slot) {
            Some(entry) => entry,
            None => return Self::null_logger(),
        };
        match entry {
            LoggerEntry::Ready(logger) => logger,
            LoggerEntry::Pending(pending) => {
                match pending.logger.get_or_try_init(|| pending.build()) {
                    Ok(logger) => {
                        debug!(logger = target, "logger constructed from factory");
                        logger
                    }
                    Err(err) => {
                        let reason = match err {
                            InitError::Failed(err) => format!("{:#}", err),
                            InitError::Reentered => "factory requested its own logger".to_string(),
                        };
                        warn!(logger = target, %reason, "logger factory failed, using null logger");
                        Self::null_logger()
                    }
                }
            }
        }
    }

    /// Record the outcome of a mutation and convert its error
    fn finish<T>(
        &self,
        action: RegistryAction,
        target: &str,
        location: SourceLocation,
        result: std::result::Result<T, RegistryError>,
    ) -> Result<()> {
        self.record(action, target, location, AuditOutcome::of(&result));
        match result {
            Ok(replaced) => {
                debug!(%action, logger = target, "logger registry updated");
                drop(replaced);
                Ok(())
            }
            Err(err) => {
                warn!(%action, logger = target, error = %err, "logger registry mutation rejected");
                Err(err.into())
            }
        }
    }

    fn record(
        &self,
        action: RegistryAction,
        target: &str,
        location: SourceLocation,
        outcome: AuditOutcome,
    ) {
        self.inner.audit.record(action, target, location, outcome);
    }
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("loggers", &self.size())
            .field("has_default", &self.has_default_logger())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
