//! Persistence Adapters - Relational Store
//!
//! PostgreSQL implementations of the `DependencyProbe` and `VisitStore`
//! ports, built on `sqlx` with one short-lived connection per call.

pub mod postgres;

pub use postgres::{PostgresConnector, PostgresProbe, PostgresVisitStore};
