//! Visit Store Port - Relational Write + Read Round Trip
//!
//! Backs the `/db-test` endpoint: record one visit and report the table
//! size observed in the same transaction.

use async_trait::async_trait;

use crate::domain::health::DependencyError;
use crate::domain::visit::VisitRecord;

/// Append-and-count visit log.
#[async_trait]
pub trait VisitStore: Send + Sync + 'static {
  /// Ensure the log exists, insert one row and count all rows.
  ///
  /// Ids are strictly increasing across calls and `total` grows by exactly
  /// one per successful call.
  async fn record_visit(&self) -> Result<VisitRecord, DependencyError>;
}
