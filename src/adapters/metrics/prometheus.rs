//! Prometheus Metrics Registry - Request Observability
//!
//! Owned, injectable registry of counter and histogram families. Series
//! values live in `prometheus` vectors (atomic per series); this wrapper
//! adds idempotent registration, label-arity checks and an export that
//! keeps families in registration order and series in first-seen order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use prometheus::core::{Collector, Metric as _};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};
use tracing::{debug, warn};

/// Registry misuse. These are wiring bugs, not runtime conditions.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Name already taken by a family of another kind or label schema.
    #[error("metric `{name}` is already registered with a different kind or label set")]
    DuplicateMetricKind { name: String },
    /// Unregistered name, wrong kind, or label values that do not match the schema.
    #[error("unknown metric series `{name}`: {detail}")]
    UnknownMetric { name: String, detail: String },
    /// Negative, NaN or infinite histogram observation.
    #[error("invalid observation {value} for `{name}`: must be finite and non-negative")]
    InvalidObservation { name: String, value: f64 },
    /// Rejected by the prometheus crate (e.g. invalid metric name).
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Metric family kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
}

impl MetricKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Histogram => "histogram",
        }
    }
}

/// Point-in-time view of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Number of observations.
    pub count: u64,
    /// Sum of all observed values.
    pub sum: f64,
    /// `(upper_bound, cumulative_count)` pairs, ascending, without `+Inf`.
    pub buckets: Vec<(f64, u64)>,
}

enum FamilyMetric {
    Counter(IntCounterVec),
    Histogram { vec: HistogramVec, buckets: Vec<f64> },
}

/// Label values in first-seen order.
#[derive(Default)]
struct SeriesIndex {
    order: Vec<Vec<String>>,
    seen: HashSet<Vec<String>>,
}

struct Family {
    name: String,
    help: String,
    label_keys: Vec<String>,
    metric: FamilyMetric,
    series: Mutex<SeriesIndex>,
}

impl Family {
    const fn kind(&self) -> MetricKind {
        match self.metric {
            FamilyMetric::Counter(_) => MetricKind::Counter,
            FamilyMetric::Histogram { .. } => MetricKind::Histogram,
        }
    }

    fn check_labels(&self, label_values: &[&str]) -> Result<(), MetricsError> {
        if label_values.len() == self.label_keys.len() {
            return Ok(());
        }
        Err(MetricsError::UnknownMetric {
            name: self.name.clone(),
            detail: format!(
                "expected {} label values ({}), got {}",
                self.label_keys.len(),
                self.label_keys.join(", "),
                label_values.len()
            ),
        })
    }

    fn track(&self, label_values: &[&str]) {
        let owned: Vec<String> = label_values.iter().map(|v| (*v).to_string()).collect();
        let mut index = self.series.lock();
        if index.seen.insert(owned.clone()) {
            index.order.push(owned);
        }
    }

    fn is_tracked(&self, label_values: &[&str]) -> bool {
        let owned: Vec<String> = label_values.iter().map(|v| (*v).to_string()).collect();
        self.series.lock().seen.contains(&owned)
    }

    fn collect(&self) -> Option<MetricFamily> {
        let mut families = match &self.metric {
            FamilyMetric::Counter(vec) => vec.collect(),
            FamilyMetric::Histogram { vec, .. } => vec.collect(),
        };
        families.pop()
    }

    fn header_lines(&self) -> Vec<String> {
        vec![
            format!("# HELP {} {}", self.name, escape_help(&self.help)),
            format!("# TYPE {} {}", self.name, self.kind().as_str()),
        ]
    }

    /// Encode this family as text exposition lines.
    fn encode(&self) -> Vec<String> {
        let Some(mut family) = self.collect() else {
            return self.header_lines();
        };
        if family.get_metric().is_empty() {
            return self.header_lines();
        }

        let positions: HashMap<Vec<String>, usize> = self
            .series
            .lock()
            .order
            .iter()
            .enumerate()
            .map(|(i, values)| (values.clone(), i))
            .collect();

        family.mut_metric().sort_by_cached_key(|metric| {
            let values: Vec<String> = self
                .label_keys
                .iter()
                .map(|key| {
                    metric
                        .get_label()
                        .iter()
                        .find(|pair| pair.get_name() == key)
                        .map(|pair| pair.get_value().to_string())
                        .unwrap_or_default()
                })
                .collect();
            positions.get(&values).copied().unwrap_or(usize::MAX)
        });

        let mut buffer = Vec::new();
        match TextEncoder::new().encode(std::slice::from_ref(&family), &mut buffer) {
            Ok(()) => String::from_utf8_lossy(&buffer)
                .lines()
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!(metric = %self.name, error = %e, "Failed to encode metric family");
                self.header_lines()
            }
        }
    }
}

/// Bucket bounds the histogram will actually use. An empty list means the
/// prometheus client defaults.
fn effective_buckets(kind: MetricKind, buckets: &[f64]) -> Vec<f64> {
    match kind {
        MetricKind::Histogram if buckets.is_empty() => prometheus::DEFAULT_BUCKETS.to_vec(),
        _ => buckets.to_vec(),
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Centralized metrics for the service.
///
/// Construct one per process and share it behind an `Arc`. Tests build
/// their own instance so runs never observe each other's series.
pub struct MetricsRegistry {
    families: RwLock<Vec<Arc<Family>>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            families: RwLock::new(Vec::new()),
        }
    }

    /// Register a counter family. Idempotent for an identical schema.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_keys: &[&str],
    ) -> Result<(), MetricsError> {
        self.register(name, help, label_keys, MetricKind::Counter, &[])
    }

    /// Register a histogram family with explicit bucket upper bounds.
    ///
    /// An empty `buckets` selects the prometheus defaults. Idempotent for an
    /// identical schema; differing effective buckets count as a different
    /// schema.
    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_keys: &[&str],
        buckets: &[f64],
    ) -> Result<(), MetricsError> {
        self.register(name, help, label_keys, MetricKind::Histogram, buckets)
    }

    fn register(
        &self,
        name: &str,
        help: &str,
        label_keys: &[&str],
        kind: MetricKind,
        buckets: &[f64],
    ) -> Result<(), MetricsError> {
        let buckets = effective_buckets(kind, buckets);
        let buckets = buckets.as_slice();
        let mut families = self.families.write();

        if let Some(existing) = families.iter().find(|f| f.name == name) {
            let same_buckets = match &existing.metric {
                FamilyMetric::Histogram { buckets: b, .. } => b.as_slice() == buckets,
                FamilyMetric::Counter(_) => true,
            };
            let same_keys = existing.label_keys.iter().eq(label_keys.iter());
            if existing.kind() == kind && same_keys && same_buckets {
                return Ok(());
            }
            return Err(MetricsError::DuplicateMetricKind {
                name: name.to_string(),
            });
        }

        let metric = match kind {
            MetricKind::Counter => {
                FamilyMetric::Counter(IntCounterVec::new(Opts::new(name, help), label_keys)?)
            }
            MetricKind::Histogram => FamilyMetric::Histogram {
                vec: HistogramVec::new(
                    HistogramOpts::new(name, help).buckets(buckets.to_vec()),
                    label_keys,
                )?,
                buckets: buckets.to_vec(),
            },
        };

        families.push(Arc::new(Family {
            name: name.to_string(),
            help: help.to_string(),
            label_keys: label_keys.iter().map(|k| (*k).to_string()).collect(),
            metric,
            series: Mutex::new(SeriesIndex::default()),
        }));

        debug!(metric = name, kind = kind.as_str(), "Registered metric family");
        Ok(())
    }

    fn family(&self, name: &str) -> Result<Arc<Family>, MetricsError> {
        self.families
            .read()
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .ok_or_else(|| MetricsError::UnknownMetric {
                name: name.to_string(),
                detail: "not registered".to_string(),
            })
    }

    fn wrong_kind(family: &Family, expected: MetricKind) -> MetricsError {
        MetricsError::UnknownMetric {
            name: family.name.clone(),
            detail: format!(
                "registered as {}, used as {}",
                family.kind().as_str(),
                expected.as_str()
            ),
        }
    }

    /// Increment a counter series by one.
    pub fn increment(&self, name: &str, label_values: &[&str]) -> Result<(), MetricsError> {
        self.increment_by(name, label_values, 1)
    }

    /// Increment a counter series by `amount`.
    pub fn increment_by(
        &self,
        name: &str,
        label_values: &[&str],
        amount: u64,
    ) -> Result<(), MetricsError> {
        let family = self.family(name)?;
        let FamilyMetric::Counter(vec) = &family.metric else {
            return Err(Self::wrong_kind(&family, MetricKind::Counter));
        };
        family.check_labels(label_values)?;

        let counter = vec.get_metric_with_label_values(label_values)?;
        family.track(label_values);
        counter.inc_by(amount);
        Ok(())
    }

    /// Record one histogram observation (seconds for latency families).
    pub fn observe(
        &self,
        name: &str,
        label_values: &[&str],
        value: f64,
    ) -> Result<(), MetricsError> {
        let family = self.family(name)?;
        let FamilyMetric::Histogram { vec, .. } = &family.metric else {
            return Err(Self::wrong_kind(&family, MetricKind::Histogram));
        };
        family.check_labels(label_values)?;
        if !value.is_finite() || value < 0.0 {
            return Err(MetricsError::InvalidObservation {
                name: name.to_string(),
                value,
            });
        }

        let histogram = vec.get_metric_with_label_values(label_values)?;
        family.track(label_values);
        histogram.observe(value);
        Ok(())
    }

    /// Current value of a counter series, `None` if never incremented.
    pub fn counter_value(&self, name: &str, label_values: &[&str]) -> Option<u64> {
        let family = self.family(name).ok()?;
        let FamilyMetric::Counter(vec) = &family.metric else {
            return None;
        };
        if family.check_labels(label_values).is_err() || !family.is_tracked(label_values) {
            return None;
        }
        vec.get_metric_with_label_values(label_values)
            .ok()
            .map(|c| c.get())
    }

    /// Snapshot of a histogram series, `None` if never observed.
    pub fn histogram_snapshot(
        &self,
        name: &str,
        label_values: &[&str],
    ) -> Option<HistogramSnapshot> {
        let family = self.family(name).ok()?;
        let FamilyMetric::Histogram { vec, .. } = &family.metric else {
            return None;
        };
        if family.check_labels(label_values).is_err() || !family.is_tracked(label_values) {
            return None;
        }
        let metric = vec.get_metric_with_label_values(label_values).ok()?.metric();
        let proto = metric.get_histogram();
        Some(HistogramSnapshot {
            count: proto.get_sample_count(),
            sum: proto.get_sample_sum(),
            buckets: proto
                .get_bucket()
                .iter()
                .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                .collect(),
        })
    }

    /// Names of all registered families, in registration order.
    pub fn family_names(&self) -> Vec<String> {
        self.families.read().iter().map(|f| f.name.clone()).collect()
    }

    /// Lazily encode every family as text exposition lines.
    ///
    /// The family list is snapshotted up front; each family is encoded only
    /// when the iterator reaches it, so writers racing with the export may
    /// or may not be reflected in later blocks.
    pub fn export(&self) -> impl Iterator<Item = String> + use<> {
        let snapshot: Vec<Arc<Family>> = self.families.read().clone();
        snapshot.into_iter().flat_map(|family| family.encode())
    }

    /// Full exposition document for the `/metrics` endpoint.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.export() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKETS: [f64; 3] = [0.1, 0.5, 1.0];

    fn registry() -> MetricsRegistry {
        let registry = MetricsRegistry::new();
        registry
            .register_counter("requests_total", "Requests", &["method", "status"])
            .unwrap();
        registry
            .register_histogram("latency_seconds", "Latency", &["method"], &BUCKETS)
            .unwrap();
        registry
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = registry();
        assert!(registry
            .register_counter("requests_total", "Requests", &["method", "status"])
            .is_ok());
        assert_eq!(registry.family_names().len(), 2);
    }

    #[test]
    fn test_register_conflicting_kind_fails() {
        let registry = registry();
        let err = registry
            .register_histogram("requests_total", "Requests", &["method", "status"], &BUCKETS)
            .unwrap_err();
        assert!(matches!(err, MetricsError::DuplicateMetricKind { .. }));
    }

    #[test]
    fn test_register_conflicting_labels_fails() {
        let registry = registry();
        let err = registry
            .register_counter("requests_total", "Requests", &["method"])
            .unwrap_err();
        assert!(matches!(err, MetricsError::DuplicateMetricKind { .. }));
    }

    #[test]
    fn test_empty_buckets_mean_defaults() {
        let registry = MetricsRegistry::new();
        registry.register_histogram("h", "H", &["route"], &[]).unwrap();
        assert!(registry
            .register_histogram("h", "H", &["route"], prometheus::DEFAULT_BUCKETS.as_slice())
            .is_ok());
        assert!(registry.register_histogram("h", "H", &["route"], &[]).is_ok());

        registry.observe("h", &["/"], 0.2).unwrap();
        let snap = registry.histogram_snapshot("h", &["/"]).unwrap();
        let bounds: Vec<f64> = snap.buckets.iter().map(|(le, _)| *le).collect();
        assert_eq!(bounds, prometheus::DEFAULT_BUCKETS.to_vec());
    }

    #[test]
    fn test_increment_unknown_metric() {
        let registry = registry();
        let err = registry.increment("nope_total", &["GET", "200"]).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownMetric { .. }));
    }

    #[test]
    fn test_increment_label_arity_mismatch() {
        let registry = registry();
        let err = registry.increment("requests_total", &["GET"]).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownMetric { .. }));
    }

    #[test]
    fn test_increment_histogram_as_counter_fails() {
        let registry = registry();
        let err = registry.increment("latency_seconds", &["GET"]).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownMetric { .. }));
    }

    #[test]
    fn test_increment_by_accumulates() {
        let registry = registry();
        registry.increment("requests_total", &["GET", "200"]).unwrap();
        registry
            .increment_by("requests_total", &["GET", "200"], 4)
            .unwrap();
        assert_eq!(registry.counter_value("requests_total", &["GET", "200"]), Some(5));
        assert_eq!(registry.counter_value("requests_total", &["POST", "200"]), None);
    }

    #[test]
    fn test_observe_rejects_negative_and_nan() {
        let registry = registry();
        assert!(matches!(
            registry.observe("latency_seconds", &["GET"], -0.1),
            Err(MetricsError::InvalidObservation { .. })
        ));
        assert!(matches!(
            registry.observe("latency_seconds", &["GET"], f64::NAN),
            Err(MetricsError::InvalidObservation { .. })
        ));
        assert!(registry.histogram_snapshot("latency_seconds", &["GET"]).is_none());
    }

    #[test]
    fn test_observe_is_cumulative() {
        let registry = registry();
        registry.observe("latency_seconds", &["GET"], 0.3).unwrap();
        registry.observe("latency_seconds", &["GET"], 0.05).unwrap();

        let snap = registry.histogram_snapshot("latency_seconds", &["GET"]).unwrap();
        assert_eq!(snap.count, 2);
        assert!((snap.sum - 0.35).abs() < 1e-9);
        assert_eq!(snap.buckets, vec![(0.1, 1), (0.5, 2), (1.0, 2)]);
    }

    #[test]
    fn test_export_empty_families_have_headers() {
        let registry = registry();
        let lines: Vec<String> = registry.export().collect();
        assert_eq!(
            lines,
            vec![
                "# HELP requests_total Requests",
                "# TYPE requests_total counter",
                "# HELP latency_seconds Latency",
                "# TYPE latency_seconds histogram",
            ]
        );
    }

    #[test]
    fn test_export_keeps_registration_and_insertion_order() {
        let registry = registry();
        registry.increment("requests_total", &["POST", "500"]).unwrap();
        registry.increment("requests_total", &["GET", "200"]).unwrap();
        registry.observe("latency_seconds", &["GET"], 0.2).unwrap();

        let text = registry.render();
        let post = text.find(r#"requests_total{method="POST",status="500"} 1"#).unwrap();
        let get = text.find(r#"requests_total{method="GET",status="200"} 1"#).unwrap();
        let hist = text.find("# TYPE latency_seconds histogram").unwrap();
        assert!(post < get);
        assert!(get < hist);
        assert!(text.contains(r#"latency_seconds_bucket{method="GET",le="0.5"} 1"#));
        assert!(text.contains(r#"latency_seconds_count{method="GET"} 1"#));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        registry.increment("requests_total", &["GET", "200"]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(
            registry.counter_value("requests_total", &["GET", "200"]),
            Some(8000)
        );
    }

    #[test]
    fn test_invalid_name_is_rejected() {
        let registry = MetricsRegistry::new();
        let err = registry.register_counter("bad name", "x", &[]).unwrap_err();
        assert!(matches!(err, MetricsError::Prometheus(_)));
    }
}
