//! Health Aggregator - Composite Dependency Status
//!
//! Runs every registered probe concurrently, bounds each by a timeout and
//! folds the outcomes into one [`HealthReport`]. Never fails: a probe that
//! times out or panics is reported as an `Error` outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::join_all;
use tracing::{info, instrument, warn};

use crate::domain::health::{DependencyError, DependencyOutcome, HealthReport};
use crate::ports::probe::DependencyProbe;

/// Runs all dependency probes and builds the composite report.
pub struct HealthAggregator {
    /// Probes in registration order.
    probes: Vec<Arc<dyn DependencyProbe>>,
    /// Upper bound on a single probe's round trip.
    probe_timeout: Duration,
}

impl HealthAggregator {
    /// Create an aggregator with no probes.
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
        }
    }

    /// Builder-style probe registration.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.register(probe);
        self
    }

    /// Register a probe. Its name becomes the report key.
    pub fn register(&mut self, probe: Arc<dyn DependencyProbe>) {
        info!(dependency = probe.name(), "Registered health probe");
        self.probes.push(probe);
    }

    /// Names of registered probes, in registration order.
    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Probe every dependency once and build the report.
    #[instrument(skip(self), fields(probes = self.probes.len()))]
    pub async fn check_health(&self) -> HealthReport {
        let checks = self.probes.iter().map(|probe| self.run_probe(probe.as_ref()));
        let report: HealthReport = join_all(checks).await.into_iter().collect();

        for (name, outcome) in report.iter() {
            if let Some(reason) = outcome.reason() {
                warn!(
                    dependency = name,
                    kind = ?reason.kind,
                    reason = %reason.message,
                    "Dependency degraded"
                );
            }
        }
        report
    }

    async fn run_probe(&self, probe: &dyn DependencyProbe) -> (String, DependencyOutcome) {
        let guarded = AssertUnwindSafe(probe.probe()).catch_unwind();
        let outcome = match tokio::time::timeout(self.probe_timeout, guarded).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => DependencyOutcome::Error(DependencyError::other("probe panicked")),
            Err(_) => DependencyOutcome::Error(DependencyError::timeout(format!(
                "no response within {} ms",
                self.probe_timeout.as_millis()
            ))),
        };
        (probe.name().to_string(), outcome)
    }
}
