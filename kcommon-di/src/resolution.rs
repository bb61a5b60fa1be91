//! Per-thread resolution stack
//!
//! Every resolution pushes its key for as long as it runs. Re-entering a
//! key that is already on the stack means a factory depends on itself,
//! directly or through other services, and is reported as a cycle instead
//! of blocking forever on its own construction.
//!
//! Frames also remember which container their instance lives in, so a
//! scoped service requested while a singleton of another container is
//! being built can be refused as a captive dependency.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::service::ServiceLifetime;

/// Identity of a container, by the address of its shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContainerId(usize);

impl ContainerId {
    pub(crate) fn of<T>(inner: &Arc<T>) -> Self {
        Self(Arc::as_ptr(inner) as *const () as usize)
    }
}

struct Frame {
    key: ServiceKey,
    lifetime: ServiceLifetime,
    holder: ContainerId,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// Pops the frame pushed by [`enter`] when dropped
pub(crate) struct ResolutionGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push `key` for the duration of its resolution
///
/// `holder` is the container the instance will be kept in: the owning
/// container for singletons, the requesting one otherwise.
pub(crate) fn enter(
    key: &ServiceKey,
    lifetime: ServiceLifetime,
    holder: ContainerId,
) -> DiResult<ResolutionGuard> {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();

        if let Some(start) = stack.iter().position(|frame| frame.key == *key) {
            let path = stack[start..]
                .iter()
                .map(|frame| frame.key.to_string())
                .chain(std::iter::once(key.to_string()))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(DiError::CyclicDependency { path });
        }

        if lifetime == ServiceLifetime::Scoped {
            // A singleton of the same container lives exactly as long as the scope
            if let Some(owner) = stack.iter().rev().find(|frame| {
                frame.lifetime == ServiceLifetime::Singleton && frame.holder != holder
            }) {
                return Err(DiError::InvalidLifetime {
                    service: key.to_string(),
                    requested: lifetime,
                    consumer: owner.key.to_string(),
                    available: owner.lifetime,
                });
            }
        }

        stack.push(Frame {
            key: key.clone(),
            lifetime,
            holder,
        });
        Ok(ResolutionGuard {
            _not_send: PhantomData,
        })
    })
}

/// Number of resolutions running on this thread
#[cfg(test)]
pub(crate) fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    fn ids() -> (ContainerId, ContainerId) {
        let root = Arc::new(0u8);
        let scope = Arc::new(1u8);
        (ContainerId::of(&root), ContainerId::of(&scope))
    }

    #[test]
    fn test_guard_pops_on_drop() {
        let (root, _) = ids();
        {
            let _a = enter(&ServiceKey::of::<A>(), ServiceLifetime::Transient, root).unwrap();
            let _b = enter(&ServiceKey::of::<B>(), ServiceLifetime::Transient, root).unwrap();
            assert_eq!(depth(), 2);
        }
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_reentry_reports_path() {
        let (root, _) = ids();
        let _a = enter(&ServiceKey::of::<A>(), ServiceLifetime::Singleton, root).unwrap();
        let _b = enter(&ServiceKey::of::<B>(), ServiceLifetime::Transient, root).unwrap();
        let err = enter(&ServiceKey::of::<A>(), ServiceLifetime::Singleton, root)
            .err()
            .unwrap();
        match err {
            DiError::CyclicDependency { path } => {
                assert_eq!(path.matches(" -> ").count(), 2);
                assert!(path.contains("B"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(depth(), 2);
    }

    #[test]
    fn test_scoped_under_foreign_singleton_is_rejected() {
        let (root, scope) = ids();
        let _a = enter(&ServiceKey::of::<A>(), ServiceLifetime::Singleton, root).unwrap();
        let err = enter(&ServiceKey::of::<B>(), ServiceLifetime::Scoped, scope)
            .err()
            .unwrap();
        assert!(matches!(err, DiError::InvalidLifetime { .. }));
    }

    #[test]
    fn test_scoped_under_singleton_of_same_scope_is_allowed() {
        let (_, scope) = ids();
        let _a = enter(&ServiceKey::of::<A>(), ServiceLifetime::Singleton, scope).unwrap();
        let _b = enter(&ServiceKey::of::<B>(), ServiceLifetime::Scoped, scope).unwrap();
        assert_eq!(depth(), 2);
    }

    #[test]
    fn test_any_foreign_singleton_on_the_stack_is_captive() {
        struct C;
        let (root, scope) = ids();
        let _a = enter(&ServiceKey::of::<A>(), ServiceLifetime::Singleton, root).unwrap();
        let _b = enter(&ServiceKey::of::<B>(), ServiceLifetime::Singleton, scope).unwrap();
        let err = enter(&ServiceKey::of::<C>(), ServiceLifetime::Scoped, scope)
            .err()
            .unwrap();
        match err {
            DiError::InvalidLifetime { consumer, .. } => assert!(consumer.contains("A")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_type_different_name_is_not_a_cycle() {
        let (root, _) = ids();
        let _a = enter(&ServiceKey::named::<A>("outer"), ServiceLifetime::Transient, root).unwrap();
        assert!(enter(&ServiceKey::named::<A>("inner"), ServiceLifetime::Transient, root).is_ok());
    }
}
