//! Route handlers.
//!
//! Dependency failures never escape a handler: they become a JSON error
//! body with HTTP 500.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use rand::Rng;
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::domain::health::DependencyError;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head><title>pulse-service</title></head>
  <body>
    <h1>pulse-service</h1>
    <p>The service is running.</p>
    <ul>
      <li><a href="/health">Dependency status</a></li>
      <li><a href="/db-test">Database round trip</a></li>
      <li><a href="/cache-test">Cache counter</a></li>
      <li><a href="/metrics">Prometheus metrics</a></li>
      <li><a href="/api/fast">Fast endpoint</a></li>
      <li><a href="/api/slow">Slow endpoint</a></li>
    </ul>
  </body>
</html>
"#;

/// `{"status":"error","kind":...,"message":...}` with HTTP 500.
fn dependency_failure(route: &str, err: &DependencyError) -> Response {
    warn!(route, kind = ?err.kind, error = %err.message, "Dependency call failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "status": "error",
            "kind": err.kind,
            "message": err.message,
        })),
    )
        .into_response()
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Prometheus text exposition of the registry.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], state.metrics.render())
}

/// One write + read round trip against the relational store.
pub async fn db_test(State(state): State<AppState>) -> Response {
    match state.visits.record_visit().await {
        Ok(visit) => Json(json!({
            "status": "success",
            "id": visit.id,
            "timestamp": visit.timestamp.to_string(),
            "total": visit.total,
        }))
        .into_response(),
        Err(e) => dependency_failure("/db-test", &e),
    }
}

/// Bump the cache hit counter.
pub async fn cache_test(State(state): State<AppState>) -> Response {
    match state.counter.bump().await {
        Ok(hits) => Json(json!({ "status": "success", "hits": hits })).into_response(),
        Err(e) => dependency_failure("/cache-test", &e),
    }
}

/// Low-latency baseline.
pub async fn fast() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Demo affordance: sleeps a random delay to populate the upper latency
/// buckets.
pub async fn slow(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (min, max) = state.slow_delay;
    let delay = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    tokio::time::sleep(delay).await;
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    Json(json!({ "status": "ok", "delay_ms": delay_ms }))
}
