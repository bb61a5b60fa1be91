//! Type erasure for stored instances
//!
//! An `Arc<T>` is boxed once more into an `Arc<dyn Any>`, which lets `T`
//! itself be unsized (`dyn Trait`). Recovery is a checked downcast back to
//! `Arc<T>`.

use std::any::Any;
use std::sync::Arc;

/// A constructed instance with its type erased
pub type ErasedInstance = Arc<dyn Any + Send + Sync>;

pub(crate) fn erase<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> ErasedInstance {
    Arc::new(instance)
}

pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
    instance: &ErasedInstance,
) -> Option<Arc<T>> {
    instance.downcast_ref::<Arc<T>>().cloned()
}
