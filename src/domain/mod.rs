//! Domain layer - Health and visit models.
//!
//! Pure types shared by ports, use cases and adapters. No I/O happens
//! here; everything is serializable and testable in isolation.

pub mod health;
pub mod visit;

// Re-export core types for convenience
pub use health::{
    CompositeStatus, DependencyError, DependencyErrorKind, DependencyOutcome,
    HealthReport,
};
pub use visit::VisitRecord;
