//! Cache Adapters - Key-Value Store
//!
//! Redis implementations of the `DependencyProbe` and `CounterStore`
//! ports.

pub mod redis;

pub use self::redis::{RedisConnector, RedisCounterStore, RedisProbe};
