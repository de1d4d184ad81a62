//! HTTP Adapter - axum Router and Shared State
//!
//! Wires the handlers into one router and wraps every route in the
//! request instrumentation middleware. Layer order, outermost first:
//! panic catcher, access-log span, instrumentation, handler.

pub mod handlers;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::adapters::metrics::health;
use crate::adapters::metrics::{MetricsRegistry, track_requests};
use crate::ports::visit_store::VisitStore;
use crate::usecases::{CacheCounter, HealthAggregator};

pub use server::HttpServer;

/// Handles shared by all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsRegistry>,
    pub health: Arc<HealthAggregator>,
    pub visits: Arc<dyn VisitStore>,
    pub counter: Arc<CacheCounter>,
    /// Bounds of the `/api/slow` demo delay.
    pub slow_delay: (Duration, Duration),
}

/// All service routes, without middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/metrics", get(handlers::metrics))
        .route("/db-test", get(handlers::db_test))
        .route("/cache-test", get(handlers::cache_test))
        .route("/api/fast", get(handlers::fast))
        .route("/api/slow", get(handlers::slow))
}

/// Wrap every route registered so far in the instrumentation stack.
pub fn instrument(router: Router<AppState>, metrics: Arc<MetricsRegistry>) -> Router<AppState> {
    router
        .layer(from_fn_with_state(metrics, track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}

/// The production router.
pub fn build_router(state: AppState) -> Router {
    instrument(routes(), Arc::clone(&state.metrics)).with_state(state)
}
