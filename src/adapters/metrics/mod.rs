//! Metrics and Monitoring Adapters
//!
//! Provides the owned Prometheus registry, the request instrumentation
//! middleware that feeds it, and the health endpoints (/health, /live,
//! /ready) backed by the dependency health aggregator.

pub mod health;
pub mod middleware;
pub mod prometheus;

pub use self::middleware::{HttpMetrics, RequestObservation, track_requests};
pub use self::prometheus::{HistogramSnapshot, MetricsError, MetricsRegistry};
