use super::*;
use crate::error::codes;
use kcommon_core::{codes as common, ErrorInfo};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn container() -> (ServiceContainer, Arc<AuditLog>) {
    let audit = Arc::new(AuditLog::new());
    (ServiceContainer::with_audit_log(Arc::clone(&audit)), audit)
}

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct Repository {
    greeter: Arc<dyn Greeter>,
}

#[test]
fn test_singleton_is_shared() {
    let (container, _) = container();
    container
        .register_simple_factory(|| Arc::new(String::from("shared")), ServiceLifetime::Singleton)
        .unwrap();

    let a = container.resolve::<String>().unwrap();
    let b = container.resolve::<String>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_transient_creates_new_instances() {
    let (container, _) = container();
    let counter = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&counter);
    container
        .register_simple_factory(
            move || Arc::new(calls.fetch_add(1, Ordering::SeqCst)),
            ServiceLifetime::Transient,
        )
        .unwrap();

    let a = container.resolve::<usize>().unwrap();
    let b = container.resolve::<usize>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_register_instance_and_trait_objects() {
    let (container, _) = container();
    let greeter: Arc<dyn Greeter> = Arc::new(English);
    container.register_instance(Arc::clone(&greeter)).unwrap();

    let resolved = container.resolve::<dyn Greeter>().unwrap();
    assert!(Arc::ptr_eq(&greeter, &resolved));
    assert_eq!(resolved.greet(), "hello");
    assert!(container.resolve::<English>().is_err());
}

#[test]
fn test_factories_resolve_dependencies() {
    let (container, _) = container();
    container
        .register_simple_factory::<dyn Greeter, _>(|| Arc::new(English), ServiceLifetime::Singleton)
        .unwrap();
    container
        .register_factory(
            |provider: &dyn ServiceProvider| {
                Ok(Arc::new(Repository {
                    greeter: provider.resolve::<dyn Greeter>()?,
                }))
            },
            ServiceLifetime::Transient,
        )
        .unwrap();

    let repo = container.resolve::<Repository>().unwrap();
    assert_eq!(repo.greeter.greet(), "hello");
}

#[test]
fn test_named_registrations_are_distinct() {
    let (container, _) = container();
    container
        .register_named_instance("primary", Arc::new(String::from("db-1")))
        .unwrap();
    container
        .register_named_instance("replica", Arc::new(String::from("db-2")))
        .unwrap();

    assert_eq!(*container.resolve_named::<String>("primary").unwrap(), "db-1");
    assert_eq!(*container.resolve_named::<String>("replica").unwrap(), "db-2");
    assert!(container.resolve::<String>().unwrap_err().is_not_found());
    assert!(container.is_named_registered::<String>("primary"));
    assert!(!container.is_registered::<String>());

    let err = container
        .register_named_instance("", Arc::new(String::new()))
        .unwrap_err();
    assert_eq!(err.code(), common::INVALID_ARGUMENT);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let (container, _) = container();
    container.register_instance(Arc::new(1u32)).unwrap();

    let err = container.register_instance(Arc::new(2u32)).unwrap_err();
    assert!(matches!(err, DiError::AlreadyRegistered { .. }));
    assert_eq!(err.code(), codes::ALREADY_REGISTERED);
    assert_eq!(*container.resolve::<u32>().unwrap(), 1);

    container.unregister::<u32>().unwrap();
    container.register_instance(Arc::new(2u32)).unwrap();
    assert_eq!(*container.resolve::<u32>().unwrap(), 2);
}

#[test]
fn test_missing_service() {
    let (container, _) = container();
    let err = container.resolve::<u64>().unwrap_err();
    assert_eq!(err.code(), codes::SERVICE_NOT_FOUND);
    assert!(container.resolve_or_null::<u64>().is_none());

    let err = container.unregister::<u64>().unwrap_err();
    assert!(err.is_not_found());

    let info: ErrorInfo = err.into();
    assert_eq!(info.code, codes::SERVICE_NOT_FOUND);
    assert_eq!(info.module, "kcommon-di");
}

#[test]
fn test_factory_failure_rolls_back_and_retries() {
    let (container, _) = container();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    container
        .register_factory(
            move |_: &dyn ServiceProvider| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("connection refused");
                }
                Ok(Arc::new(5i64))
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();

    let err = container.resolve::<i64>().unwrap_err();
    assert_eq!(err.code(), codes::FACTORY_FAILED);
    assert!(err.to_string().contains("connection refused"));
    assert!(!container.registered_services()[0].constructed);

    assert_eq!(*container.resolve::<i64>().unwrap(), 5);
    assert_eq!(*container.resolve::<i64>().unwrap(), 5);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(container.registered_services()[0].constructed);
}

#[test]
fn test_factory_panic_is_contained() {
    let (container, _) = container();
    container
        .register_simple_factory::<u8, _>(|| panic!("bad config"), ServiceLifetime::Singleton)
        .unwrap();

    let err = container.resolve::<u8>().unwrap_err();
    assert!(matches!(err, DiError::FactoryFailed { .. }));
    assert!(err.to_string().contains("bad config"));
    assert!(container.resolve_or_null::<u8>().is_none());
}

#[derive(Debug)]
struct Left;
#[derive(Debug)]
struct Right;

#[test]
fn test_cycle_fails_fast() {
    let (container, _) = container();
    container
        .register_factory(
            |provider: &dyn ServiceProvider| {
                provider.resolve::<Right>()?;
                Ok(Arc::new(Left))
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();
    container
        .register_factory(
            |provider: &dyn ServiceProvider| {
                provider.resolve::<Left>()?;
                Ok(Arc::new(Right))
            },
            ServiceLifetime::Transient,
        )
        .unwrap();

    let err = container.resolve::<Left>().unwrap_err();
    assert_eq!(err.code(), codes::CYCLIC_DEPENDENCY);
    match err {
        DiError::CyclicDependency { path } => {
            let hops: Vec<&str> = path.split(" -> ").collect();
            assert_eq!(hops.len(), 3);
            assert_eq!(hops[0], hops[2]);
            assert!(hops[1].ends_with("Right"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failed construction was rolled back.
    assert!(!container.registered_services().iter().any(|d| d.constructed));
}

#[test]
fn test_scoped_lifetime() {
    let (root, _) = container();
    root.register_simple_factory(|| Arc::new(Vec::<u8>::new()), ServiceLifetime::Scoped)
        .unwrap();

    let err = root.resolve::<Vec<u8>>().unwrap_err();
    assert_eq!(err.code(), codes::SCOPED_FROM_ROOT);

    let first = root.create_scope();
    let second = root.create_scope();
    let a1 = first.resolve::<Vec<u8>>().unwrap();
    let a2 = first.resolve::<Vec<u8>>().unwrap();
    let b1 = second.resolve::<Vec<u8>>().unwrap();
    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b1));
}

#[test]
fn test_singletons_are_owned_by_registering_container() {
    let (root, _) = container();
    root.register_simple_factory(|| Arc::new(String::from("root")), ServiceLifetime::Singleton)
        .unwrap();

    let first = root.create_scope();
    let second = root.create_scope();
    let a = first.resolve::<String>().unwrap();
    let b = second.resolve::<String>().unwrap();
    let c = root.resolve::<String>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
}

#[test]
fn test_scope_registrations_stay_local() {
    let (root, _) = container();
    let scope = root.create_scope();
    scope.register_instance(Arc::new(7u16)).unwrap();

    assert!(root.resolve::<u16>().unwrap_err().is_not_found());
    assert_eq!(*scope.resolve::<u16>().unwrap(), 7);
    assert!(root.registered_services().is_empty());

    drop(scope);
    assert!(root.resolve::<u16>().unwrap_err().is_not_found());
}

#[test]
fn test_scope_shadows_parent() {
    let (root, _) = container();
    root.register_instance(Arc::new(String::from("parent"))).unwrap();
    let scope = root.create_scope();
    scope.register_instance(Arc::new(String::from("child"))).unwrap();

    assert_eq!(*scope.resolve::<String>().unwrap(), "child");
    assert_eq!(*root.resolve::<String>().unwrap(), "parent");
}

#[test]
fn test_scope_outliving_parent() {
    let (root, _) = container();
    root.register_instance(Arc::new(1u8)).unwrap();
    let scope = root.create_scope();
    assert!(scope.resolve::<u8>().is_ok());

    drop(root);
    assert!(scope.resolve::<u8>().unwrap_err().is_not_found());
}

#[test]
fn test_scoped_cache_follows_reregistration() {
    let (root, _) = container();
    root.register_simple_factory(|| Arc::new(String::from("v1")), ServiceLifetime::Scoped)
        .unwrap();
    let scope = root.create_scope();
    assert_eq!(*scope.resolve::<String>().unwrap(), "v1");

    root.unregister::<String>().unwrap();
    root.register_simple_factory(|| Arc::new(String::from("v2")), ServiceLifetime::Scoped)
        .unwrap();
    assert_eq!(*scope.resolve::<String>().unwrap(), "v2");
}

#[test]
fn test_dropping_scope_releases_scoped_instances() {
    let (root, _) = container();
    root.register_simple_factory(|| Arc::new(Vec::<u32>::new()), ServiceLifetime::Scoped)
        .unwrap();

    let scope = root.create_scope();
    let instance = scope.resolve::<Vec<u32>>().unwrap();
    let weak = Arc::downgrade(&instance);
    drop(instance);
    assert!(weak.upgrade().is_some());

    drop(scope);
    assert!(weak.upgrade().is_none());
    assert!(root.is_registered::<Vec<u32>>());
    assert!(root.create_scope().resolve::<Vec<u32>>().is_ok());
}

struct Reporter {
    scope: ServiceContainer,
    resolved_on_drop: Arc<AtomicBool>,
}

impl Drop for Reporter {
    fn drop(&mut self) {
        let resolved = self.scope.resolve::<Vec<u8>>().is_ok();
        self.resolved_on_drop.store(resolved, Ordering::SeqCst);
    }
}

#[test]
fn test_unregister_drops_cached_instance_outside_cache_lock() {
    let (root, _) = container();
    root.register_simple_factory(|| Arc::new(Vec::<u8>::new()), ServiceLifetime::Scoped)
        .unwrap();
    let scope = root.create_scope();

    let handle = Arc::new(Mutex::new(Some(scope.clone())));
    let resolved_on_drop = Arc::new(AtomicBool::new(false));
    let factory_handle = Arc::clone(&handle);
    let flag = Arc::clone(&resolved_on_drop);
    scope
        .register_factory(
            move |_: &dyn ServiceProvider| {
                let scope = factory_handle
                    .lock()
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("scope handle already taken"))?;
                Ok(Arc::new(Reporter {
                    scope,
                    resolved_on_drop: Arc::clone(&flag),
                }))
            },
            ServiceLifetime::Scoped,
        )
        .unwrap();

    drop(scope.resolve::<Reporter>().unwrap());
    assert!(!resolved_on_drop.load(Ordering::SeqCst));

    // The cache held the last reference, so the drop runs inside unregister
    scope.unregister::<Reporter>().unwrap();
    assert!(resolved_on_drop.load(Ordering::SeqCst));
}

#[test]
fn test_scope_singleton_may_use_scoped_of_same_scope() {
    let (root, _) = container();
    root.register_simple_factory(|| Arc::new(1u32), ServiceLifetime::Scoped)
        .unwrap();
    let scope = root.create_scope();
    scope
        .register_factory(
            |provider: &dyn ServiceProvider| {
                let value = provider.resolve::<u32>()?;
                Ok(Arc::new(u64::from(*value)))
            },
            ServiceLifetime::Singleton,
        )
        .unwrap();

    assert_eq!(*scope.resolve::<u64>().unwrap(), 1);
    assert!(scope.resolve::<u32>().is_ok());
}

#[test]
fn test_singleton_cannot_capture_scoped() {
    let (root, _) = container();
    root.register_simple_factory(|| Arc::new(1u32), ServiceLifetime::Scoped)
        .unwrap();
    let scope = root.create_scope();
    let captured = scope.clone();
    root.register_factory(
        move |_: &dyn ServiceProvider| {
            let value = captured.resolve::<u32>()?;
            Ok(Arc::new(u64::from(*value)))
        },
        ServiceLifetime::Singleton,
    )
    .unwrap();

    for requester in [&root, &scope] {
        let err = requester.resolve::<u64>().unwrap_err();
        assert_eq!(err.code(), codes::FACTORY_FAILED);
        assert!(err.to_string().contains("Invalid service lifetime"));
    }
}

#[test]
fn test_freeze_rejects_mutation_but_not_resolution() {
    let (container, _) = container();
    container.register_instance(Arc::new(String::from("kept"))).unwrap();
    container.freeze();
    container.freeze();
    assert!(container.is_frozen());

    let err = container.register_instance(Arc::new(3u32)).unwrap_err();
    assert_eq!(err, DiError::RegistryFrozen);
    assert_eq!(err.code(), common::REGISTRY_FROZEN);

    let err = container.unregister::<String>().unwrap_err();
    assert_eq!(err.code(), common::REGISTRY_FROZEN);

    assert!(container.clear().is_ok());
    assert_eq!(*container.resolve::<String>().unwrap(), "kept");
}

#[test]
fn test_freeze_is_not_inherited() {
    let (root, _) = container();
    root.freeze();

    let scope = root.create_scope();
    assert!(!scope.is_frozen());
    scope.register_instance(Arc::new(1u8)).unwrap();
    scope.freeze();
    assert!(scope.register_instance(Arc::new(2u16)).is_err());
}

#[test]
fn test_audit_records_mutations_with_call_site() {
    let (container, audit) = container();
    let line = line!() + 1;
    container.register_instance(Arc::new(1u8)).unwrap();
    container.resolve::<u8>().unwrap();
    container.freeze();
    container.freeze();
    container.register_instance(Arc::new(1u16)).unwrap_err();
    container.clear().unwrap();

    let events = audit.events();
    let actions: Vec<RegistryAction> = events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            RegistryAction::RegisterService,
            RegistryAction::FreezeServiceContainer,
            RegistryAction::RegisterService,
            RegistryAction::ClearServices,
        ]
    );

    assert!(events[0].success);
    assert_eq!(events[0].target_name, "u8");
    assert_eq!(events[0].line(), line);
    assert!(events[0].file().ends_with("container_tests.rs"));
    assert_eq!(events[0].function(), "ServiceContainer::register_instance");

    assert!(!events[2].success);
    assert_eq!(events[2].error_message.as_deref(), Some("Registry is frozen"));
    assert!(!events[3].success);
    assert_eq!(events[3].error_message.as_deref(), Some("Registry is frozen"));
    assert!(audit.verify_chain().is_ok());
}

#[test]
fn test_clear_removes_entries_and_scoped_cache() {
    let (root, audit) = container();
    root.register_instance(Arc::new(1u8)).unwrap();
    let scope = root.create_scope();
    scope
        .register_simple_factory(|| Arc::new(2u16), ServiceLifetime::Scoped)
        .unwrap();
    let before = scope.resolve::<u16>().unwrap();

    scope.clear().unwrap();
    assert!(scope.registered_services().is_empty());
    assert!(scope.resolve::<u16>().unwrap_err().is_not_found());
    assert_eq!(*scope.resolve::<u8>().unwrap(), 1);
    assert_eq!(*before, 2);

    root.clear().unwrap();
    assert!(root.registered_services().is_empty());
    assert_eq!(audit.events_by_action(RegistryAction::ClearServices).len(), 2);
}

#[test]
fn test_registered_services_describe_entries() {
    let (container, _) = container();
    container.register_instance(Arc::new(1u8)).unwrap();
    container
        .register_simple_factory(|| Arc::new(2u16), ServiceLifetime::Transient)
        .unwrap();

    let mut descriptors = container.registered_services();
    descriptors.sort_by_key(|d| d.service_type_name());
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].service_type_name(), "u16");
    assert_eq!(descriptors[0].lifetime, ServiceLifetime::Transient);
    assert!(!descriptors[0].constructed);
    assert_eq!(descriptors[1].lifetime, ServiceLifetime::Singleton);
    assert!(descriptors[1].constructed);
}

#[test]
fn test_global_container_is_shared() {
    assert!(std::ptr::eq(ServiceContainer::global(), ServiceContainer::global()));
}
