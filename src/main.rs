//! pulse-service — Entry Point
//!
//! Wiring sequence:
//! 1. Load configuration (defaults → optional TOML via APP_CONFIG → env)
//! 2. Init tracing (JSON structured logging)
//! 3. Create the metrics registry and register the HTTP families
//! 4. Create Postgres + Redis connectors, probes and stores
//! 5. Build the health aggregator and the cache counter
//! 6. Spawn the HTTP server
//! 7. Wait for SIGINT → graceful shutdown (drain requests → exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use pulse_service::adapters::cache::{RedisConnector, RedisCounterStore, RedisProbe};
use pulse_service::adapters::http::{AppState, HttpServer};
use pulse_service::adapters::metrics::{HttpMetrics, MetricsRegistry};
use pulse_service::adapters::persistence::{PostgresConnector, PostgresProbe, PostgresVisitStore};
use pulse_service::config::loader::{CONFIG_PATH_ENV, load_config};
use pulse_service::usecases::{CacheCounter, HealthAggregator};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::var(CONFIG_PATH_ENV).ok();
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.server.bind_address,
        "Starting pulse-service"
    );

    // ── 3. Metrics registry ─────────────────────────────────
    let metrics = Arc::new(MetricsRegistry::new());
    HttpMetrics::register(&metrics).context("Failed to register HTTP metrics")?;

    // ── 4. Dependency connectors, probes and stores ─────────
    let probe_timeout = Duration::from_millis(config.health.probe_timeout_ms);
    let postgres = PostgresConnector::new(&config.database, probe_timeout);
    let redis = RedisConnector::new(&config.redis, probe_timeout)
        .with_context(|| format!("Invalid Redis address: {}", config.redis.url()))?;

    // ── 5. Use cases ────────────────────────────────────────
    let health = HealthAggregator::new(probe_timeout)
        .with_probe(Arc::new(PostgresProbe::new(postgres.clone())))
        .with_probe(Arc::new(RedisProbe::new(redis.clone())));
    let counter = CacheCounter::new(Arc::new(RedisCounterStore::new(redis)), &config.cache);

    let state = AppState {
        metrics,
        health: Arc::new(health),
        visits: Arc::new(PostgresVisitStore::new(postgres)),
        counter: Arc::new(counter),
        slow_delay: (
            Duration::from_millis(config.server.slow_min_ms),
            Duration::from_millis(config.server.slow_max_ms),
        ),
    };

    // ── 6. Spawn HTTP server ────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let server = HttpServer::new(state, config.server.bind_address.clone());
    let server_shutdown = shutdown_tx.subscribe();
    let mut server_handle = tokio::spawn(async move {
        let result = server.run(server_shutdown).await;
        if let Err(e) = &result {
            error!(error = %e, "HTTP server failed");
        }
        result
    });

    // ── 7. Wait for SIGINT or server exit ───────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
        joined = &mut server_handle => {
            warn!("HTTP server exited before shutdown was requested");
            return joined
                .context("HTTP server task panicked")?
                .context("HTTP server failed");
        }
    }

    let _ = shutdown_tx.send(());

    // Drain in-flight requests (up to 10s; /api/slow tops out at a few seconds)
    match tokio::time::timeout(Duration::from_secs(10), server_handle).await {
        Ok(joined) => joined
            .context("HTTP server task panicked")?
            .context("HTTP server failed during shutdown")?,
        Err(_) => warn!("HTTP server did not drain in time"),
    }

    info!("Shutdown complete");
    Ok(())
}
