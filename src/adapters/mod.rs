//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies, and exposes the service over HTTP. Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `cache`: Redis probe and counter store
//! - `http`: axum router, handlers and server lifecycle
//! - `metrics`: Prometheus registry, request instrumentation, health endpoints
//! - `persistence`: PostgreSQL probe and visit log

pub mod cache;
pub mod http;
pub mod metrics;
pub mod persistence;
