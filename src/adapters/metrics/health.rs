//! Health Endpoints - Liveness, Readiness and Dependency Status
//!
//! `/health` is the scrape-friendly summary: always 200, one field per
//! dependency. `/ready` carries the full report with reasons and answers
//! 503 while any dependency is down, for orchestrators that need a
//! non-200 signal. `/live` only proves the process answers HTTP.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Map, Value};

use crate::adapters::http::AppState;
use crate::domain::health::{CompositeStatus, HealthReport};

/// Response header carrying the composite status on `/health`.
pub const HEALTH_STATUS_HEADER: &str = "x-health-status";

/// `{"app":"ok", "<dependency>": "connected"|"error", ...}`.
pub fn summary_body(report: &HealthReport) -> Value {
    let mut body = Map::new();
    body.insert("app".to_string(), Value::from("ok"));
    for (name, outcome) in report.iter() {
        body.insert(name.to_string(), Value::from(outcome.label()));
    }
    Value::Object(body)
}

/// Dependency summary: always 200 so scrapers can read it during outages.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check_health().await;
    (
        StatusCode::OK,
        [(HEALTH_STATUS_HEADER, report.status().as_str())],
        Json(summary_body(&report)),
    )
}

/// Liveness probe: always returns 200 if the process is running.
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 200 only if every dependency is connected.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check_health().await;
    let status = match report.status() {
        CompositeStatus::Ok => StatusCode::OK,
        CompositeStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::health::{DependencyError, DependencyOutcome};

    #[test]
    fn test_summary_body_shape() {
        let mut report = HealthReport::new();
        report.insert(
            "database",
            DependencyOutcome::Error(DependencyError::auth("password authentication failed")),
        );
        report.insert("redis", DependencyOutcome::Connected);

        assert_eq!(
            summary_body(&report),
            serde_json::json!({"app": "ok", "database": "error", "redis": "connected"})
        );
    }
}
