//! Registered service entries

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use crate::cell::InstanceCell;
use crate::erased::ErasedInstance;
use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::provider::ServiceProvider;
use crate::service::{ServiceDescriptor, ServiceLifetime};

/// Type-erased factory stored in an entry
pub(crate) type ErasedFactory =
    Arc<dyn Fn(&dyn ServiceProvider) -> anyhow::Result<ErasedInstance> + Send + Sync>;

/// One registration: factory, lifetime and the container-level instance
pub(crate) struct ServiceEntry {
    key: ServiceKey,
    lifetime: ServiceLifetime,
    factory: ErasedFactory,
    /// Singleton cache. Unused by transient and scoped entries.
    instance: InstanceCell<ErasedInstance>,
}

impl ServiceEntry {
    pub fn new(key: ServiceKey, lifetime: ServiceLifetime, factory: ErasedFactory) -> Self {
        Self {
            key,
            lifetime,
            factory,
            instance: InstanceCell::new(),
        }
    }

    /// A singleton entry whose construction is already complete
    pub fn with_instance(key: ServiceKey, instance: ErasedInstance) -> Self {
        let shared = Arc::clone(&instance);
        Self {
            key,
            lifetime: ServiceLifetime::Singleton,
            factory: Arc::new(move |_: &dyn ServiceProvider| {
                Ok::<_, anyhow::Error>(Arc::clone(&shared))
            }),
            instance: InstanceCell::with_value(instance),
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub fn instance(&self) -> &InstanceCell<ErasedInstance> {
        &self.instance
    }

    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            key: self.key.clone(),
            lifetime: self.lifetime,
            constructed: self.instance.is_initialized(),
        }
    }

    /// Run the factory, converting errors and panics
    pub fn construct(&self, provider: &dyn ServiceProvider) -> DiResult<ErasedInstance> {
        let factory = &self.factory;
        match panic::catch_unwind(AssertUnwindSafe(|| factory(provider))) {
            Ok(Ok(instance)) => {
                debug!(service = %self.key, lifetime = %self.lifetime, "service constructed");
                Ok(instance)
            }
            Ok(Err(err)) => Err(self.factory_error(err)),
            Err(payload) => Err(DiError::FactoryFailed {
                service: self.key.to_string(),
                reason: format!("factory panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }

    fn factory_error(&self, err: anyhow::Error) -> DiError {
        // Cycles found deeper in the graph keep their full path.
        match err.downcast::<DiError>() {
            Ok(cycle @ DiError::CyclicDependency { .. }) => cycle,
            Ok(other) => DiError::FactoryFailed {
                service: self.key.to_string(),
                reason: other.to_string(),
            },
            Err(err) => DiError::FactoryFailed {
                service: self.key.to_string(),
                reason: format!("{:#}", err),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
