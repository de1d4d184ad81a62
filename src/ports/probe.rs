//! Dependency Probe Port - Live Reachability Checks
//!
//! A probe performs one fresh round trip against its dependency on every
//! call. Outcomes are never cached; a failed round trip is reported as
//! `DependencyOutcome::Error`, never as a panic or a propagated error.

use async_trait::async_trait;

use crate::domain::health::DependencyOutcome;

/// Capability: attempt a connection and report the outcome.
#[async_trait]
pub trait DependencyProbe: Send + Sync + 'static {
  /// Stable dependency name used as the report key (e.g. `database`).
  fn name(&self) -> &'static str;

  /// Run one live check.
  ///
  /// Any resource acquired for the check must be released before this
  /// returns, on success and on failure.
  async fn probe(&self) -> DependencyOutcome;
}
