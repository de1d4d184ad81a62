//! Metrics Registry Benchmarks — Per-Request Hot Path
//!
//! Every request pays one histogram observation and one counter
//! increment, plus an occasional full export when Prometheus scrapes.
//!
//! Run with: cargo bench --bench registry_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use axum::http::StatusCode;
use pulse_service::adapters::metrics::{HttpMetrics, MetricsRegistry, RequestObservation};

fn registry() -> MetricsRegistry {
    let registry = MetricsRegistry::new();
    HttpMetrics::register(&registry).expect("register http metrics");
    registry
}

/// Benchmark one complete request observation (observe + increment).
fn bench_request_observation(c: &mut Criterion) {
    let registry = registry();

    c.bench_function("request_observation_complete", |b| {
        b.iter(|| {
            let observation = RequestObservation::begin(black_box("GET"), black_box("/api/fast"));
            observation
                .complete(StatusCode::OK, &registry)
                .expect("record request");
        });
    });
}

/// Benchmark rendering the exposition document with a realistic series count.
fn bench_render(c: &mut Criterion) {
    let registry = registry();
    let routes = ["/", "/health", "/metrics", "/db-test", "/cache-test", "/api/fast", "/api/slow"];
    for route in routes {
        for status in [StatusCode::OK, StatusCode::INTERNAL_SERVER_ERROR] {
            RequestObservation::begin("GET", route)
                .complete(status, &registry)
                .expect("record request");
        }
    }

    c.bench_function("registry_render", |b| {
        b.iter(|| black_box(registry.render()));
    });
}

criterion_group!(benches, bench_request_observation, bench_render);
criterion_main!(benches);
