//! Route resolution benchmarks.
//!
//! Run with: `cargo bench -p gatehouse-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gatehouse_router::RouteRegistry;
use http::Method;

fn build_registry(num_routes: usize) -> RouteRegistry {
    let mut registry = RouteRegistry::new();

    for i in 0..num_routes / 3 {
        registry
            .register(&Method::GET, &format!("/api/v1/resource{i}"))
            .expect("static route");
        registry
            .register(&Method::GET, &format!("/api/v1/resource{i}/:id"))
            .expect("param route");
        registry
            .register(&Method::GET, &format!("/api/v1/org/:orgId/resource{i}/:id"))
            .expect("nested route");
    }

    registry
}

fn bench_static_resolve(c: &mut Criterion) {
    let registry = build_registry(100);

    c.bench_function("static_resolve", |b| {
        b.iter(|| black_box(registry.resolve(&Method::GET, "/api/v1/resource20")));
    });
}

fn bench_param_resolve(c: &mut Criterion) {
    let registry = build_registry(100);

    c.bench_function("param_resolve", |b| {
        b.iter(|| black_box(registry.resolve(&Method::GET, "/api/v1/resource20/12345")));
    });
}

fn bench_match_with_params(c: &mut Criterion) {
    let registry = build_registry(100);

    c.bench_function("match_with_params", |b| {
        b.iter(|| {
            black_box(registry.match_route(&Method::GET, "/api/v1/org/acme/resource20/12345"))
        });
    });
}

fn bench_miss(c: &mut Criterion) {
    let registry = build_registry(100);

    c.bench_function("miss", |b| {
        b.iter(|| black_box(registry.resolve(&Method::GET, "/api/v2/nothing/here")));
    });
}

fn bench_registry_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_size");

    for size in [30, 300, 3000] {
        let registry = build_registry(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &registry, |b, registry| {
            b.iter(|| black_box(registry.resolve(&Method::GET, "/api/v1/org/acme/resource5/1")));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_static_resolve,
    bench_param_resolve,
    bench_match_with_params,
    bench_miss,
    bench_registry_sizes
);
criterion_main!(benches);
