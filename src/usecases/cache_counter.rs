//! Cache Counter - Expiring Hit Counter
//!
//! `bump` increments a fixed key and arms its TTL only on the increment
//! that created it. The store's INCR is atomic, so exactly one caller
//! observes `1` per key lifetime. No retries, no transaction.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::config::CacheConfig;
use crate::domain::health::DependencyError;
use crate::ports::counter_store::CounterStore;

/// Hit counter over a [`CounterStore`].
pub struct CacheCounter {
    store: Arc<dyn CounterStore>,
    key: String,
    ttl_secs: u64,
    timestamp_prefix: String,
    timestamp_ttl_secs: u64,
}

impl CacheCounter {
    pub fn new(store: Arc<dyn CounterStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            key: config.counter_key.clone(),
            ttl_secs: config.counter_ttl_secs,
            timestamp_prefix: config.timestamp_prefix.clone(),
            timestamp_ttl_secs: config.timestamp_ttl_secs,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Increment the counter and return the new value.
    ///
    /// Also writes a short-lived `{prefix}:{hits}` marker holding the hit
    /// time in unix seconds.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn bump(&self) -> Result<i64, DependencyError> {
        let hits = self.store.incr(&self.key).await?;
        if hits == 1 {
            self.store.expire(&self.key, self.ttl_secs).await?;
            debug!(ttl_secs = self.ttl_secs, "Counter created, TTL armed");
        }

        let marker = format!("{}:{hits}", self.timestamp_prefix);
        self.store
            .set_with_ttl(&marker, &Utc::now().timestamp().to_string(), self.timestamp_ttl_secs)
            .await?;

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use mockall::mock;
    use mockall::predicate::eq;

    use crate::domain::health::DependencyErrorKind;

    mock! {
        pub Store {}

        #[async_trait::async_trait]
        impl CounterStore for Store {
            async fn incr(&self, key: &str) -> Result<i64, DependencyError>;
            async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), DependencyError>;
            async fn set_with_ttl(
                &self,
                key: &str,
                value: &str,
                ttl_secs: u64,
            ) -> Result<(), DependencyError>;
        }
    }

    fn config() -> CacheConfig {
        CacheConfig::default()
    }

    #[tokio::test]
    async fn test_first_hit_arms_ttl() {
        let mut store = MockStore::new();
        let mut seq = Sequence::new();
        store
            .expect_incr()
            .with(eq("cache:counter"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(1));
        store
            .expect_expire()
            .with(eq("cache:counter"), eq(300))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let before = Utc::now().timestamp();
        store
            .expect_set_with_ttl()
            .withf(move |key, value, ttl| {
                let stamped = value.parse::<i64>().unwrap_or_default();
                key == "cache:timestamp:1" && *ttl == 60 && (before..=before + 5).contains(&stamped)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let counter = CacheCounter::new(Arc::new(store), &config());
        assert_eq!(counter.bump().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_later_hits_leave_ttl_alone() {
        let mut store = MockStore::new();
        store.expect_incr().returning(|_| Ok(2));
        store.expect_expire().never();
        store.expect_set_with_ttl().returning(|_, _, _| Ok(()));

        let counter = CacheCounter::new(Arc::new(store), &config());
        assert_eq!(counter.bump().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let mut store = MockStore::new();
        store
            .expect_incr()
            .returning(|_| Err(DependencyError::connection("refused")));
        store.expect_expire().never();
        store.expect_set_with_ttl().never();

        let counter = CacheCounter::new(Arc::new(store), &config());
        let err = counter.bump().await.unwrap_err();
        assert_eq!(err.kind, DependencyErrorKind::ConnectionFailed);
    }
}
