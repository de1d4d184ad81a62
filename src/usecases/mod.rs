//! Use Cases Layer - Application Logic
//!
//! Orchestrates port interfaces into the service's workflows. Each use
//! case is a self-contained operation with no knowledge of HTTP.
//!
//! Use cases:
//! - `HealthAggregator`: Probe all dependencies, derive composite status
//! - `CacheCounter`: Expiring hit counter on the key-value cache

pub mod cache_counter;
pub mod health;

pub use cache_counter::CacheCounter;
pub use health::HealthAggregator;
