//! PostgreSQL adapters: reachability probe and visit log.
//!
//! Every operation opens its own connection and closes it before
//! returning. No pool is kept, so a probe always exercises the full
//! connect + authenticate path.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, instrument};

use crate::config::DatabaseConfig;
use crate::domain::health::{DependencyError, DependencyOutcome};
use crate::domain::visit::VisitRecord;
use crate::ports::probe::DependencyProbe;
use crate::ports::visit_store::VisitStore;

const CREATE_VISITS: &str = "CREATE TABLE IF NOT EXISTS visits (
    id SERIAL PRIMARY KEY,
    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";
const INSERT_VISIT: &str = "INSERT INTO visits DEFAULT VALUES RETURNING id, timestamp";
const COUNT_VISITS: &str = "SELECT COUNT(*) FROM visits";

/// Map a sqlx error onto the dependency failure taxonomy.
///
/// SQLSTATE class 28 is "invalid authorization specification".
pub fn classify(err: &sqlx::Error) -> DependencyError {
    match err {
        sqlx::Error::Database(db) if db.code().is_some_and(|c| c.starts_with("28")) => {
            DependencyError::auth(err.to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DependencyError::connection(err.to_string()),
        sqlx::Error::PoolTimedOut => DependencyError::timeout(err.to_string()),
        _ => DependencyError::other(err.to_string()),
    }
}

/// Connection factory shared by the probe and the visit store.
#[derive(Clone)]
pub struct PostgresConnector {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PostgresConnector {
    pub fn new(config: &DatabaseConfig, connect_timeout: Duration) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);
        Self {
            options,
            connect_timeout,
        }
    }

    async fn connect(&self) -> Result<PgConnection, DependencyError> {
        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
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

/// Release a connection, logging (not failing) on a dirty close.
async fn release(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        debug!(error = %e, "Postgres connection closed uncleanly");
    }
}

/// Probe named `database`: connect, `SELECT version()`, close.
pub struct PostgresProbe {
    connector: PostgresConnector,
}

impl PostgresProbe {
    pub const fn new(connector: PostgresConnector) -> Self {
        Self { connector }
    }

    async fn check(&self) -> Result<(), DependencyError> {
        let mut conn = self.connector.connect().await?;
        let version = sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&mut conn)
            .await;
        release(conn).await;

        let version = version.map_err(|e| classify(&e))?;
        debug!(%version, "Postgres reachable");
        Ok(())
    }
}

#[async_trait]
impl DependencyProbe for PostgresProbe {
    fn name(&self) -> &'static str {
        "database"
    }

    #[instrument(skip(self), name = "postgres_probe")]
    async fn probe(&self) -> DependencyOutcome {
        self.check().await.into()
    }
}

/// Visit log in the `visits` table.
pub struct PostgresVisitStore {
    connector: PostgresConnector,
}

impl PostgresVisitStore {
    pub const fn new(connector: PostgresConnector) -> Self {
        Self { connector }
    }

    async fn round_trip(conn: &mut PgConnection) -> Result<VisitRecord, sqlx::Error> {
        let mut tx = conn.begin().await?;

        sqlx::query(CREATE_VISITS).execute(&mut *tx).await?;
        let (id, timestamp): (i32, NaiveDateTime) =
            sqlx::query_as(INSERT_VISIT).fetch_one(&mut *tx).await?;
        let total: i64 = sqlx::query_scalar(COUNT_VISITS).fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok(VisitRecord {
            id,
            timestamp,
            total,
        })
    }
}

#[async_trait]
impl VisitStore for PostgresVisitStore {
    #[instrument(skip(self))]
    async fn record_visit(&self) -> Result<VisitRecord, DependencyError> {
        let mut conn = self.connector.connect().await?;
        let result = Self::round_trip(&mut conn).await;
        release(conn).await;

        let record = result.map_err(|e| classify(&e))?;
        debug!(id = record.id, total = record.total, "Visit recorded");
        Ok(record)
    }
}
