//! Ordered startup and shutdown of the registries
//!
//! A [`Bootstrapper`] collects logger factories, service registration steps,
//! initialization callbacks and shutdown hooks, then applies them in a fixed
//! order:
//!
//! 1. audit logging is switched on or off per [`AuditConfig`](crate::config::AuditConfig)
//! 2. logger factories are installed
//! 3. registration steps run in the order they were added
//! 4. the registries selected for freezing are frozen
//! 5. initialization callbacks run
//!
//! Shutdown runs the hooks in reverse registration order against a shared
//! time budget, then clears whatever registry is still mutable.

use crate::config::CommonConfig;
use crate::telemetry;
use kcommon_core::{codes, make_error, ErrorInfo, VoidResult};
use kcommon_di::{DiError, ServiceContainer};
use kcommon_logger::{Logger, LoggerFactory, LoggerRegistry};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MODULE: &str = "kcommon::bootstrap";

/// Service registration step
pub type RegistrationStep = Box<dyn Fn(&ServiceContainer) -> anyhow::Result<()> + Send + Sync>;

/// Callback run once initialization has completed
pub type InitCallback = Box<dyn Fn(&ServiceContainer, &LoggerRegistry) + Send + Sync>;

/// Shutdown hook, given the time left in the shutdown budget
pub type ShutdownHook = Box<dyn Fn(Duration) + Send + Sync>;

pub struct Bootstrapper {
    services: ServiceContainer,
    loggers: LoggerRegistry,
    config: CommonConfig,
    auto_freeze_loggers: bool,
    auto_freeze_services: bool,
    install_tracing: bool,
    default_logger: Option<LoggerFactory>,
    named_loggers: Vec<(String, LoggerFactory)>,
    steps: Vec<(String, RegistrationStep)>,
    init_callbacks: Vec<InitCallback>,
    shutdown_hooks: Vec<(String, ShutdownHook)>,
    initialized: bool,
}

impl Bootstrapper {
    /// Bootstrapper driving the global container and logger registry
    pub fn new() -> Self {
        Self::with_registries(
            ServiceContainer::global().clone(),
            LoggerRegistry::global().clone(),
        )
    }

    /// Bootstrapper driving the given registries
    pub fn with_registries(services: ServiceContainer, loggers: LoggerRegistry) -> Self {
        Self {
            services,
            loggers,
            config: CommonConfig::default(),
            auto_freeze_loggers: false,
            auto_freeze_services: false,
            install_tracing: false,
            default_logger: None,
            named_loggers: Vec::new(),
            steps: Vec::new(),
            init_callbacks: Vec::new(),
            shutdown_hooks: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_config(mut self, config: CommonConfig) -> Self {
        self.config = config;
        self
    }

    /// Freeze the registries after initialization regardless of the
    /// `[freeze]` configuration
    pub fn with_auto_freeze(mut self, loggers: bool, services: bool) -> Self {
        self.auto_freeze_loggers = loggers;
        self.auto_freeze_services = services;
        self
    }

    /// Install a `tracing` subscriber from the `[logging]` configuration
    /// during initialization
    pub fn with_tracing(mut self) -> Self {
        self.install_tracing = true;
        self
    }

    /// Factory for the default logger
    pub fn with_default_logger<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Logger>> + Send + Sync + 'static,
    {
        self.default_logger = Some(Arc::new(factory));
        self
    }

    /// Factory for a named logger
    pub fn with_logger<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Logger>> + Send + Sync + 'static,
    {
        self.named_loggers.push((name.into(), Arc::new(factory)));
        self
    }

    /// Add a service registration step
    pub fn add_registration<F>(mut self, name: impl Into<String>, step: F) -> Self
    where
        F: Fn(&ServiceContainer) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.steps.push((name.into(), Box::new(step)));
        self
    }

    pub fn on_initialize<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ServiceContainer, &LoggerRegistry) + Send + Sync + 'static,
    {
        self.init_callbacks.push(Box::new(callback));
        self
    }

    /// Register a named shutdown hook
    pub fn register_shutdown_hook<F>(&mut self, name: &str, hook: F) -> VoidResult
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        if name.is_empty() {
            return make_error(codes::INVALID_ARGUMENT, "Shutdown hook name is empty", MODULE);
        }
        if self.shutdown_hooks.iter().any(|(existing, _)| existing == name) {
            return Err(
                ErrorInfo::new(codes::ALREADY_EXISTS, "Shutdown hook already registered", MODULE)
                    .with_details(name),
            );
        }
        self.shutdown_hooks.push((name.to_string(), Box::new(hook)));
        Ok(())
    }

    pub fn unregister_shutdown_hook(&mut self, name: &str) -> VoidResult {
        match self.shutdown_hooks.iter().position(|(existing, _)| existing == name) {
            Some(index) => {
                self.shutdown_hooks.remove(index);
                Ok(())
            }
            None => Err(
                ErrorInfo::new(codes::NOT_FOUND, "Shutdown hook not registered", MODULE)
                    .with_details(name),
            ),
        }
    }

    pub fn shutdown_hook_names(&self) -> Vec<String> {
        self.shutdown_hooks.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Run the startup sequence
    ///
    /// Calling this on an initialized bootstrapper is a no-op. If a logger
    /// factory cannot be installed or a registration step fails, both
    /// registries are cleared and nothing is frozen.
    pub fn initialize(&mut self) -> VoidResult {
        if self.initialized {
            debug!("bootstrapper already initialized");
            return Ok(());
        }

        let audit_enabled = self.config.audit.enabled;
        self.services.audit_log().set_enabled(audit_enabled);
        self.loggers.audit_log().set_enabled(audit_enabled);

        if self.install_tracing {
            if let Err(e) = telemetry::init_tracing(&self.config.logging) {
                warn!(error = %e, "tracing subscriber not installed");
            }
        }

        if let Err(err) = self.install_loggers() {
            self.rollback();
            return Err(err);
        }

        for (name, step) in &self.steps {
            debug!(step = %name, "running registration step");
            if let Err(e) = step(&self.services) {
                let err = step_error(name, &e);
                warn!(step = %name, error = %err, "registration step failed");
                self.rollback();
                return Err(err);
            }
        }

        if self.config.freeze.loggers || self.auto_freeze_loggers {
            self.loggers.freeze();
        }
        if self.config.freeze.services || self.auto_freeze_services {
            self.services.freeze();
        }

        for callback in &self.init_callbacks {
            callback(&self.services, &self.loggers);
        }

        self.initialized = true;
        info!(
            services = self.services.registered_services().len(),
            loggers = self.loggers.size(),
            "bootstrap complete"
        );
        Ok(())
    }

    /// Run the shutdown hooks newest first, then clear the registries
    ///
    /// Each hook receives the time left of the configured budget. Once the
    /// budget is spent the remaining hooks are skipped and the call reports
    /// [`codes::TIMEOUT`]; the registries are cleared either way. A frozen
    /// registry keeps its entries.
    pub fn shutdown(&mut self) -> VoidResult {
        if !self.initialized {
            return make_error(codes::NOT_INITIALIZED, "Bootstrapper is not initialized", MODULE);
        }

        let budget = self.config.shutdown.timeout();
        let started = Instant::now();
        let mut skipped = Vec::new();

        for (name, hook) in self.shutdown_hooks.iter().rev() {
            let remaining = budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                skipped.push(name.clone());
                continue;
            }
            debug!(hook = %name, ?remaining, "running shutdown hook");
            if panic::catch_unwind(AssertUnwindSafe(|| hook(remaining))).is_err() {
                warn!(hook = %name, "shutdown hook panicked");
            }
        }

        self.rollback();
        self.initialized = false;

        if skipped.is_empty() {
            info!("shutdown complete");
            Ok(())
        } else {
            warn!(?skipped, "shutdown budget exhausted");
            Err(
                ErrorInfo::new(codes::TIMEOUT, "Shutdown timed out", MODULE)
                    .with_details(skipped.join(", ")),
            )
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }

    pub fn loggers(&self) -> &LoggerRegistry {
        &self.loggers
    }

    pub fn config(&self) -> &CommonConfig {
        &self.config
    }

    fn install_loggers(&self) -> VoidResult {
        if let Some(factory) = &self.default_logger {
            let factory = Arc::clone(factory);
            self.loggers.set_default_factory(move || factory())?;
        }
        for (name, factory) in &self.named_loggers {
            let factory = Arc::clone(factory);
            self.loggers.register_factory(name, move || factory())?;
        }
        Ok(())
    }

    fn rollback(&self) {
        if let Err(e) = self.services.clear() {
            warn!(error = %e, "failed to clear services");
        }
        if let Err(e) = self.loggers.clear() {
            warn!(error = %e, "failed to clear loggers");
        }
    }
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Bootstrapper {
    fn drop(&mut self) {
        if self.initialized {
            if let Err(e) = self.shutdown() {
                warn!(error = %e, "shutdown on drop failed");
            }
        }
    }
}

fn step_error(step: &str, err: &anyhow::Error) -> ErrorInfo {
    let info = if let Some(di) = err.downcast_ref::<DiError>() {
        ErrorInfo::from(di.clone())
    } else if let Some(info) = err.downcast_ref::<ErrorInfo>() {
        info.clone()
    } else {
        ErrorInfo::new(codes::INTERNAL_ERROR, format!("{:#}", err), MODULE)
    };
    info.with_details(format!("registration step '{}'", step))
}
