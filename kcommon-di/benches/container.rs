use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kcommon_core::AuditLog;
use kcommon_di::prelude::*;
use std::sync::Arc;

struct Config {
    retries: u32,
}

struct Client {
    config: Arc<Config>,
}

fn container() -> ServiceContainer {
    let container = ServiceContainer::with_audit_log(Arc::new(AuditLog::new()));
    container
        .register_simple_factory(|| Arc::new(Config { retries: 3 }), ServiceLifetime::Singleton)
        .unwrap();
    container
        .register_factory(
            |provider: &dyn ServiceProvider| {
                Ok(Arc::new(Client {
                    config: provider.resolve::<Config>()?,
                }))
            },
            ServiceLifetime::Transient,
        )
        .unwrap();
    container
        .register_simple_factory(|| Arc::new(Vec::<u64>::with_capacity(16)), ServiceLifetime::Scoped)
        .unwrap();
    container.freeze();
    container
}

fn resolution_benchmarks(c: &mut Criterion) {
    let container = container();
    let mut group = c.benchmark_group("resolve");

    group.bench_function("singleton", |b| {
        b.iter(|| black_box(container.resolve::<Config>().unwrap().retries));
    });

    group.bench_function("transient_with_dependency", |b| {
        b.iter(|| black_box(container.resolve::<Client>().unwrap().config.retries));
    });

    let scope = container.create_scope();
    group.bench_function("scoped_cached", |b| {
        b.iter(|| black_box(scope.resolve::<Vec<u64>>().unwrap().capacity()));
    });

    group.bench_function("scope_create_and_resolve", |b| {
        b.iter(|| {
            let scope = container.create_scope();
            black_box(scope.resolve::<Vec<u64>>().unwrap().capacity())
        });
    });

    group.bench_function("missing", |b| {
        b.iter(|| black_box(container.resolve_or_null::<String>().is_none()));
    });

    group.finish();
}

criterion_group!(benches, resolution_benchmarks);
criterion_main!(benches);
