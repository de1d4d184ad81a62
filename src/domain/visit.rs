//! Visit log entities written by the `/db-test` round trip.

use chrono::NaiveDateTime;
use serde::Serialize;

/// One inserted visit plus the table size after the insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitRecord {
    /// Serial primary key of the inserted row.
    pub id: i32,
    /// Database-side insert timestamp.
    pub timestamp: NaiveDateTime,
    /// Row count observed in the same transaction.
    pub total: i64,
}
