//! Counter Store Port - Expiring Integer Counters
//!
//! Thin command surface over a key-value cache. Each call is a single
//! round trip; the store's INCR is assumed atomic.

use async_trait::async_trait;

use crate::domain::health::DependencyError;

/// Key-value commands needed by the cache counter use case.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
  /// Atomically increment `key` by one and return the new value.
  async fn incr(&self, key: &str) -> Result<i64, DependencyError>;

  /// Set a time-to-live on an existing key.
  async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), DependencyError>;

  /// Store `value` under `key` with a time-to-live.
  async fn set_with_ttl(
    &self,
    key: &str,
    value: &str,
    ttl_secs: u64,
  ) -> Result<(), DependencyError>;
}
