//! Request Instrumentation Middleware
//!
//! Times every request that reaches the router and records exactly one
//! latency observation and one request count per request, labelled by
//! method, matched route template and final status code.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use tracing::{debug, error};

use super::prometheus::{MetricsError, MetricsRegistry};

/// Counter family: requests by method, route and status.
pub const REQUESTS_TOTAL: &str = "http_requests_total";

/// Histogram family: request latency in seconds by method and route.
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Latency buckets in seconds (Prometheus client defaults).
pub const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Registration of the HTTP metric families.
pub struct HttpMetrics;

impl HttpMetrics {
    /// Register both request families. Safe to call more than once.
    pub fn register(registry: &MetricsRegistry) -> Result<(), MetricsError> {
        registry.register_counter(
            REQUESTS_TOTAL,
            "Total HTTP requests by method, route and status",
            &["method", "route", "status"],
        )?;
        registry.register_histogram(
            REQUEST_DURATION_SECONDS,
            "HTTP request latency in seconds by method and route",
            &["method", "route"],
            &DURATION_BUCKETS,
        )
    }
}

/// In-flight request record.
///
/// Created when the request enters the middleware and consumed by
/// [`RequestObservation::complete`] once the status is known.
#[derive(Debug)]
pub struct RequestObservation {
    method: String,
    route: String,
    started: Instant,
}

impl RequestObservation {
    /// Start timing a request.
    pub fn begin(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
            started: Instant::now(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Record the finished request and return its latency.
    pub fn complete(
        self,
        status: StatusCode,
        registry: &MetricsRegistry,
    ) -> Result<Duration, MetricsError> {
        let elapsed = self.started.elapsed();
        let labels = [self.method.as_str(), self.route.as_str()];

        registry.observe(REQUEST_DURATION_SECONDS, &labels, elapsed.as_secs_f64())?;
        registry.increment(
            REQUESTS_TOTAL,
            &[self.method.as_str(), self.route.as_str(), status.as_str()],
        )?;

        debug!(
            method = %self.method,
            route = %self.route,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );
        Ok(elapsed)
    }
}

/// Route template the router matched, or [`UNMATCHED_ROUTE`].
fn route_of(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |p| p.as_str().to_string())
}

/// axum middleware: `from_fn_with_state(registry, track_requests)`.
///
/// A panicking handler is recorded as `500` and the panic is resumed
/// unchanged afterwards, so the transport layer still sees the fault.
pub async fn track_requests(
    State(registry): State<Arc<MetricsRegistry>>,
    request: Request,
    next: Next,
) -> Response {
    let observation = RequestObservation::begin(request.method().as_str(), route_of(&request));

    let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;
    let status = outcome
        .as_ref()
        .map_or(StatusCode::INTERNAL_SERVER_ERROR, Response::status);

    let recorded = observation.complete(status, &registry);
    finish(outcome, recorded)
}

fn finish(
    outcome: Result<Response, Box<dyn Any + Send>>,
    recorded: Result<Duration, MetricsError>,
) -> Response {
    match (outcome, recorded) {
        (Ok(response), Ok(_)) => response,
        (Err(payload), Ok(_)) => std::panic::resume_unwind(payload),
        (Err(payload), Err(e)) => {
            error!(error = %e, "Request metrics misconfigured");
            std::panic::resume_unwind(payload)
        }
        (Ok(_), Err(e)) => panic!("request metrics misconfigured: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_repeatable() {
        let registry = MetricsRegistry::new();
        HttpMetrics::register(&registry).unwrap();
        HttpMetrics::register(&registry).unwrap();
        assert_eq!(
            registry.family_names(),
            vec![REQUESTS_TOTAL.to_string(), REQUEST_DURATION_SECONDS.to_string()]
        );
    }

    #[test]
    fn test_complete_records_one_pair() {
        let registry = MetricsRegistry::new();
        HttpMetrics::register(&registry).unwrap();

        let observation = RequestObservation::begin("GET", "/api/fast");
        assert_eq!(observation.method(), "GET");
        assert_eq!(observation.route(), "/api/fast");
        observation.complete(StatusCode::OK, &registry).unwrap();

        assert_eq!(
            registry.counter_value(REQUESTS_TOTAL, &["GET", "/api/fast", "200"]),
            Some(1)
        );
        let snap = registry
            .histogram_snapshot(REQUEST_DURATION_SECONDS, &["GET", "/api/fast"])
            .unwrap();
        assert_eq!(snap.count, 1);
        assert!(snap.sum >= 0.0);
    }

    #[test]
    fn test_complete_without_registration_fails() {
        let registry = MetricsRegistry::new();
        let err = RequestObservation::begin("GET", "/")
            .complete(StatusCode::OK, &registry)
            .unwrap_err();
        assert!(matches!(err, MetricsError::UnknownMetric { .. }));
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_finish_resumes_original_panic() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let _ = finish(Err(payload), Ok(Duration::ZERO));
    }

    #[test]
    #[should_panic(expected = "request metrics misconfigured")]
    fn test_finish_fails_loudly_on_misuse() {
        let err = MetricsError::UnknownMetric {
            name: REQUESTS_TOTAL.to_string(),
            detail: "not registered".to_string(),
        };
        let _ = finish(Ok(Response::new(axum::body::Body::empty())), Err(err));
    }
}
