//! Configuration Module - Service Settings
//!
//! Settings come from built-in defaults, an optional TOML file and
//! environment variable overrides, in that order (see `loader`). The
//! defaults are placeholders for a local compose setup, not secrets.

pub mod loader;

use serde::Deserialize;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// HTTP listener and logging.
  #[serde(default)]
  pub server: ServerConfig,
  /// Relational store connection.
  #[serde(default)]
  pub database: DatabaseConfig,
  /// Key-value cache connection.
  #[serde(default)]
  pub redis: RedisConfig,
  /// Health probing.
  #[serde(default)]
  pub health: HealthConfig,
  /// Cache counter keys and expiries.
  #[serde(default)]
  pub cache: CacheConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Listener address.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
  /// Log level (trace, debug, info, warn, error) when RUST_LOG is unset.
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Lower bound of the `/api/slow` delay (milliseconds).
  #[serde(default = "default_slow_min_ms")]
  pub slow_min_ms: u64,
  /// Upper bound of the `/api/slow` delay (milliseconds).
  #[serde(default = "default_slow_max_ms")]
  pub slow_max_ms: u64,
}

/// PostgreSQL connection settings.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
  #[serde(default = "default_db_host")]
  pub host: String,
  #[serde(default = "default_db_port")]
  pub port: u16,
  /// Database name.
  #[serde(default = "default_db_name")]
  pub name: String,
  #[serde(default = "default_db_user")]
  pub user: String,
  #[serde(default = "default_db_password")]
  pub password: String,
}

// Keep the password out of logs.
impl std::fmt::Debug for DatabaseConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DatabaseConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("name", &self.name)
      .field("user", &self.user)
      .field("password", &"<redacted>")
      .finish()
  }
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
  #[serde(default = "default_redis_host")]
  pub host: String,
  #[serde(default = "default_redis_port")]
  pub port: u16,
}

impl RedisConfig {
  /// Connection URL for the redis client.
  pub fn url(&self) -> String {
    format!("redis://{}:{}/", self.host, self.port)
  }
}

/// Health probing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
  /// Upper bound on one probe round trip (milliseconds).
  #[serde(default = "default_probe_timeout_ms")]
  pub probe_timeout_ms: u64,
}

/// Cache counter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Key incremented by `/cache-test`.
  #[serde(default = "default_counter_key")]
  pub counter_key: String,
  /// Expiry armed when the counter is created (seconds).
  #[serde(default = "default_counter_ttl")]
  pub counter_ttl_secs: u64,
  /// Prefix of the per-hit timestamp markers.
  #[serde(default = "default_timestamp_prefix")]
  pub timestamp_prefix: String,
  /// Expiry of each timestamp marker (seconds).
  #[serde(default = "default_timestamp_ttl")]
  pub timestamp_ttl_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
      log_level: default_log_level(),
      slow_min_ms: default_slow_min_ms(),
      slow_max_ms: default_slow_max_ms(),
    }
  }
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self {
      host: default_db_host(),
      port: default_db_port(),
      name: default_db_name(),
      user: default_db_user(),
      password: default_db_password(),
    }
  }
}

impl Default for RedisConfig {
  fn default() -> Self {
    Self {
      host: default_redis_host(),
      port: default_redis_port(),
    }
  }
}

impl Default for HealthConfig {
  fn default() -> Self {
    Self {
      probe_timeout_ms: default_probe_timeout_ms(),
    }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      counter_key: default_counter_key(),
      counter_ttl_secs: default_counter_ttl(),
      timestamp_prefix: default_timestamp_prefix(),
      timestamp_ttl_secs: default_timestamp_ttl(),
    }
  }
}

// Default value functions for serde

fn default_bind_address() -> String {
  "0.0.0.0:8000".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_slow_min_ms() -> u64 {
  500
}

fn default_slow_max_ms() -> u64 {
  2000
}

fn default_db_host() -> String {
  "postgres".to_string()
}

fn default_db_port() -> u16 {
  5432
}

fn default_db_name() -> String {
  "appdb".to_string()
}

fn default_db_user() -> String {
  "appuser".to_string()
}

fn default_db_password() -> String {
  "password".to_string()
}

fn default_redis_host() -> String {
  "redis".to_string()
}

fn default_redis_port() -> u16 {
  6379
}

fn default_probe_timeout_ms() -> u64 {
  3000
}

fn default_counter_key() -> String {
  "cache:counter".to_string()
}

fn default_counter_ttl() -> u64 {
  300
}

fn default_timestamp_prefix() -> String {
  "cache:timestamp".to_string()
}

fn default_timestamp_ttl() -> u64 {
  60
}
