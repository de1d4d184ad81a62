//! Configuration Loader - File, Environment and Validation
//!
//! Handles the optional `config.toml`, applies environment variable
//! overrides and validates the result with clear error messages.

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "APP_CONFIG";

/// Load configuration: defaults, then `path` (if any), then process env.
///
/// # Errors
/// Returns detailed error if:
/// - The file doesn't exist or can't be read
/// - TOML parsing fails
/// - An environment override doesn't parse
/// - Validation rules are violated
pub fn load_config(path: Option<&str>) -> Result<AppConfig> {
  let mut config = match path {
    Some(path) => read_file(Path::new(path))?,
    None => AppConfig::default(),
  };

  apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
  validate_config(&config)?;

  info!(
    bind = %config.server.bind_address,
    db_host = %config.database.host,
    redis_host = %config.redis.host,
    probe_timeout_ms = config.health.probe_timeout_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

fn read_file(path: &Path) -> Result<AppConfig> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  toml::from_str(&content)
    .with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  raw
    .trim()
    .parse()
    .with_context(|| format!("Invalid value for {key}: {raw:?}"))
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Recognised: `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`,
/// `REDIS_HOST`, `REDIS_PORT`, `BIND_ADDRESS`, `LOG_LEVEL`,
/// `PROBE_TIMEOUT_MS`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(v) = lookup("DB_HOST") {
    config.database.host = v;
  }
  if let Some(v) = lookup("DB_PORT") {
    config.database.port = parse_var("DB_PORT", &v)?;
  }
  if let Some(v) = lookup("DB_NAME") {
    config.database.name = v;
  }
  if let Some(v) = lookup("DB_USER") {
    config.database.user = v;
  }
  if let Some(v) = lookup("DB_PASSWORD") {
    config.database.password = v;
  }
  if let Some(v) = lookup("REDIS_HOST") {
    config.redis.host = v;
  }
  if let Some(v) = lookup("REDIS_PORT") {
    config.redis.port = parse_var("REDIS_PORT", &v)?;
  }
  if let Some(v) = lookup("BIND_ADDRESS") {
    config.server.bind_address = v;
  }
  if let Some(v) = lookup("LOG_LEVEL") {
    config.server.log_level = v;
  }
  if let Some(v) = lookup("PROBE_TIMEOUT_MS") {
    config.health.probe_timeout_ms = parse_var("PROBE_TIMEOUT_MS", &v)?;
  }
  Ok(())
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  config
    .server
    .bind_address
    .parse::<SocketAddr>()
    .with_context(|| format!("Invalid bind_address: {}", config.server.bind_address))?;

  anyhow::ensure!(
    config.server.slow_min_ms <= config.server.slow_max_ms,
    "slow_min_ms ({}) must not exceed slow_max_ms ({})",
    config.server.slow_min_ms,
    config.server.slow_max_ms
  );

  anyhow::ensure!(!config.database.host.is_empty(), "Database host must not be empty");
  anyhow::ensure!(!config.database.name.is_empty(), "Database name must not be empty");
  anyhow::ensure!(!config.redis.host.is_empty(), "Redis host must not be empty");

  anyhow::ensure!(
    config.health.probe_timeout_ms > 0,
    "probe_timeout_ms must be positive"
  );

  anyhow::ensure!(
    !config.cache.counter_key.is_empty(),
    "Cache counter_key must not be empty"
  );
  anyhow::ensure!(
    config.cache.counter_ttl_secs > 0 && config.cache.timestamp_ttl_secs > 0,
    "Cache TTLs must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config(Some("nonexistent.toml"));
    assert!(result.is_err());
  }

  #[test]
  fn test_defaults_are_valid() {
    let config = AppConfig::default();
    assert!(validate_config(&config).is_ok());
    assert_eq!(config.database.host, "postgres");
    assert_eq!(config.redis.url(), "redis://redis:6379/");
    assert_eq!(config.cache.counter_ttl_secs, 300);
  }

  #[test]
  fn test_env_overrides_apply() {
    let mut config = AppConfig::default();
    apply_env_overrides(
      &mut config,
      env(&[("DB_HOST", "db.internal"), ("DB_PORT", "6543"), ("REDIS_HOST", "cache")]),
    )
    .unwrap();

    assert_eq!(config.database.host, "db.internal");
    assert_eq!(config.database.port, 6543);
    assert_eq!(config.redis.host, "cache");
    assert_eq!(config.database.user, "appuser");
  }

  #[test]
  fn test_bad_port_is_rejected() {
    let mut config = AppConfig::default();
    let err = apply_env_overrides(&mut config, env(&[("REDIS_PORT", "sixty")])).unwrap_err();
    assert!(err.to_string().contains("REDIS_PORT"));
  }

  #[test]
  fn test_partial_toml_keeps_defaults() {
    let config: AppConfig = toml::from_str(
      r#"
        [database]
        host = "localhost"

        [health]
        probe_timeout_ms = 500
      "#,
    )
    .unwrap();

    assert_eq!(config.database.host, "localhost");
    assert_eq!(config.database.port, 5432);
    assert_eq!(config.health.probe_timeout_ms, 500);
    assert_eq!(config.server.bind_address, "0.0.0.0:8000");
  }

  #[test]
  fn test_validation_rejects_inverted_slow_range() {
    let mut config = AppConfig::default();
    config.server.slow_min_ms = 3000;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_password_is_redacted_in_debug() {
    let rendered = format!("{:?}", AppConfig::default().database);
    assert!(!rendered.contains("\"password\""));
    assert!(rendered.contains("<redacted>"));
  }
}
