//! Dependency health domain types.
//!
//! A probe produces a [`DependencyOutcome`] per call; the aggregator folds
//! the outcomes of all probes into a [`HealthReport`] whose composite
//! status is `ok` only when every dependency is connected.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

// ────────────────────────────────────────────
// Failure taxonomy
// ────────────────────────────────────────────

/// Closed set of failure kinds a dependency can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyErrorKind {
    /// Connection refused, reset, DNS failure or TLS failure.
    ConnectionFailed,
    /// Credentials rejected by the dependency.
    AuthFailed,
    /// The round trip did not complete in time.
    Timeout,
    /// Anything else (query error, protocol error, unexpected reply).
    Other,
}

impl DependencyErrorKind {
    /// Whether a later attempt might succeed without operator action.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::ConnectionFailed | Self::Timeout)
    }
}

impl std::fmt::Display for DependencyErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection failed"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::Timeout => write!(f, "timed out"),
            Self::Other => write!(f, "error"),
        }
    }
}

/// A dependency failure with a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DependencyError {
    /// Failure category.
    pub kind: DependencyErrorKind,
    /// Human-readable diagnostic, safe to embed in a JSON string.
    pub message: String,
}

impl DependencyError {
    /// Build an error, stripping control characters from the message.
    pub fn new(kind: DependencyErrorKind, message: impl Into<String>) -> Self {
        let message: String = message.into();
        let message = message
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect::<String>()
            .trim()
            .to_string();
        Self { kind, message }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(DependencyErrorKind::ConnectionFailed, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(DependencyErrorKind::AuthFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(DependencyErrorKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DependencyErrorKind::Other, message)
    }
}

// ────────────────────────────────────────────
// Probe outcomes and the composite report
// ────────────────────────────────────────────

/// Result of a single live probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyOutcome {
    Connected,
    Error(DependencyError),
}

impl DependencyOutcome {
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Short label used in the `/health` body.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Error(_) => "error",
        }
    }

    /// Diagnostic reason, if the probe failed.
    pub fn reason(&self) -> Option<&DependencyError> {
        match self {
            Self::Connected => None,
            Self::Error(err) => Some(err),
        }
    }
}

impl From<Result<(), DependencyError>> for DependencyOutcome {
    fn from(result: Result<(), DependencyError>) -> Self {
        match result {
            Ok(()) => Self::Connected,
            Err(err) => Self::Error(err),
        }
    }
}

impl Serialize for DependencyOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("status", self.label())?;
        if let Self::Error(err) = self {
            map.serialize_entry("kind", &err.kind)?;
            map.serialize_entry("reason", &err.message)?;
        }
        map.end()
    }
}

/// Aggregate status over all dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeStatus {
    Ok,
    Degraded,
}

impl CompositeStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
        }
    }
}

impl std::fmt::Display for CompositeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request health snapshot. Entries keep probe registration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthReport {
    entries: Vec<(String, DependencyOutcome)>,
}

impl HealthReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for a dependency, replacing an earlier entry with
    /// the same name.
    pub fn insert(&mut self, name: impl Into<String>, outcome: DependencyOutcome) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = outcome,
            None => self.entries.push((name, outcome)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DependencyOutcome> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DependencyOutcome)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Ok` iff every recorded dependency is connected.
    pub fn status(&self) -> CompositeStatus {
        if self.entries.iter().all(|(_, o)| o.is_connected()) {
            CompositeStatus::Ok
        } else {
            CompositeStatus::Degraded
        }
    }
}

impl FromIterator<(String, DependencyOutcome)> for HealthReport {
    fn from_iter<I: IntoIterator<Item = (String, DependencyOutcome)>>(iter: I) -> Self {
        let mut report = Self::new();
        for (name, outcome) in iter {
            report.insert(name, outcome);
        }
        report
    }
}

/// Detailed form: `{"status": "...", "dependencies": {name: outcome}}`.
impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Dependencies<'a>(&'a [(String, DependencyOutcome)]);

        impl Serialize for Dependencies<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, outcome) in self.0 {
                    map.serialize_entry(name, outcome)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("status", &self.status())?;
        map.serialize_entry("dependencies", &Dependencies(&self.entries))?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down() -> DependencyOutcome {
        DependencyOutcome::Error(DependencyError::connection("refused"))
    }

    #[test]
    fn test_empty_report_is_ok() {
        assert_eq!(HealthReport::new().status(), CompositeStatus::Ok);
    }

    #[test]
    fn test_any_error_degrades() {
        let mut report = HealthReport::new();
        report.insert("database", DependencyOutcome::Connected);
        report.insert("redis", down());
        assert_eq!(report.status(), CompositeStatus::Degraded);
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let mut report = HealthReport::new();
        report.insert("redis", down());
        report.insert("redis", DependencyOutcome::Connected);
        assert_eq!(report.len(), 1);
        assert_eq!(report.status(), CompositeStatus::Ok);
    }

    #[test]
    fn test_message_control_chars_are_stripped() {
        let err = DependencyError::other("line one\nline two\u{7}");
        assert_eq!(err.message, "line one line two");
    }

    #[test]
    fn test_detailed_serialization() {
        let report: HealthReport = vec![
            ("database".to_string(), down()),
            ("redis".to_string(), DependencyOutcome::Connected),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["dependencies"]["database"]["status"], "error");
        assert_eq!(json["dependencies"]["database"]["kind"], "connection_failed");
        assert_eq!(json["dependencies"]["database"]["reason"], "refused");
        assert_eq!(json["dependencies"]["redis"]["status"], "connected");
        assert!(json["dependencies"]["redis"].get("reason").is_none());
    }

    #[test]
    fn test_transient_kinds() {
        assert!(DependencyErrorKind::Timeout.is_transient());
        assert!(DependencyErrorKind::ConnectionFailed.is_transient());
        assert!(!DependencyErrorKind::AuthFailed.is_transient());
    }
}
