//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use cases require from the
//! outside world. Adapters implement these traits against PostgreSQL and
//! Redis; tests implement them in memory.
//!
//! Port categories:
//! - `DependencyProbe`: Live reachability check of one dependency
//! - `CounterStore`: Expiring integer counters (Redis)
//! - `VisitStore`: Append-and-count visit log (PostgreSQL)

pub mod counter_store;
pub mod probe;
pub mod visit_store;

pub use counter_store::CounterStore;
pub use probe::DependencyProbe;
pub use visit_store::VisitStore;
