//! Redis adapters: reachability probe and counter store.
//!
//! The probe opens a fresh connection per check, so a dead server is
//! noticed on the next check rather than hidden behind a cached handle.
//! The counter store shares one lazily created [`ConnectionManager`],
//! which reconnects on its own after a drop.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{ErrorKind, RedisError};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::RedisConfig;
use crate::domain::health::{DependencyError, DependencyOutcome};
use crate::ports::counter_store::CounterStore;
use crate::ports::probe::DependencyProbe;

/// Map a redis error onto the dependency failure taxonomy.
pub fn classify(err: &RedisError) -> DependencyError {
    if err.kind() == ErrorKind::AuthenticationFailed {
        DependencyError::auth(err.to_string())
    } else if err.is_timeout() {
        DependencyError::timeout(err.to_string())
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        DependencyError::connection(err.to_string())
    } else {
        DependencyError::other(err.to_string())
    }
}

/// Connection factory shared by the probe and the counter store.
#[derive(Clone)]
pub struct RedisConnector {
    client: redis::Client,
    connect_timeout: Duration,
}

impl RedisConnector {
    /// Fails only on a malformed connection URL; no I/O happens here.
    pub fn new(config: &RedisConfig, connect_timeout: Duration) -> redis::RedisResult<Self> {
        Ok(Self {
            client: redis::Client::open(config.url())?,
            connect_timeout,
        })
    }

    async fn connect(&self) -> Result<MultiplexedConnection, DependencyError> {
        match tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(result) => result.map_err(|e| classify(&e)),
            Err(_) => Err(DependencyError::timeout(format!(
                "connect did not complete within {} ms",
                self.connect_timeout.as_millis()
            ))),
        }
    }

    async fn manage(&self) -> Result<ConnectionManager, DependencyError> {
        match tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new(self.client.clone()),
        )
        .await
        {
            Ok(result) => result.map_err(|e| classify(&e)),
            Err(_) => Err(DependencyError::timeout(format!(
                "connect did not complete within {} ms",
                self.connect_timeout.as_millis()
            ))),
        }
    }
}

/// Probe named `redis`: connect and `PING`.
pub struct RedisProbe {
    connector: RedisConnector,
}

impl RedisProbe {
    pub const fn new(connector: RedisConnector) -> Self {
        Self { connector }
    }

    async fn check(&self) -> Result<(), DependencyError> {
        let mut conn = self.connector.connect().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(&e))?;
        if pong != "PONG" {
            return Err(DependencyError::other(format!("unexpected PING reply: {pong}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DependencyProbe for RedisProbe {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self), name = "redis_probe")]
    async fn probe(&self) -> DependencyOutcome {
        self.check().await.into()
    }
}

/// Counter commands over plain Redis keys.
///
/// All commands, across requests, go over one shared connection. A failed
/// first connect leaves the slot empty and the next command retries.
pub struct RedisCounterStore {
    connector: RedisConnector,
    manager: OnceCell<ConnectionManager>,
}

impl RedisCounterStore {
    pub fn new(connector: RedisConnector) -> Self {
        Self {
            connector,
            manager: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, DependencyError> {
        self.manager
            .get_or_try_init(|| self.connector.manage())
            .await
            .cloned()
    }

    /// Whether the shared connection has been established.
    pub fn is_connected(&self) -> bool {
        self.manager.initialized()
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, DependencyError> {
        let mut conn = self.connection().await?;
        let value: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(&e))?;
        debug!(key, value, "INCR");
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), DependencyError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(&e))?;
        debug!(key, ttl_secs, "EXPIRE");
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<(), DependencyError> {
        let mut conn = self.connection().await?;
        let () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }
}
