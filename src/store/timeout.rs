use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{Item, StoreClient, StoreError, WriteOp};

/// Applies a request-level timeout to every call of the wrapped store.
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: StoreClient> StoreClient for TimeoutStore<S> {
    async fn point_read(&self, table: &str, key: &str) -> Result<Option<Item>, StoreError> {
        tokio::time::timeout(self.timeout, self.inner.point_read(table, key))
            .await
            .unwrap_or_else(|_| {
                warn!(table, key, timeout = ?self.timeout, "point read timed out");
                Err(StoreError::Timeout)
            })
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let count = ops.len();
        tokio::time::timeout(self.timeout, self.inner.transact_write(ops))
            .await
            .unwrap_or_else(|_| {
                warn!(operations = count, timeout = ?self.timeout, "transact write timed out");
                Err(StoreError::Timeout)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Never answers.
    struct Stalled;

    #[async_trait]
    impl StoreClient for Stalled {
        async fn point_read(&self, _: &str, _: &str) -> Result<Option<Item>, StoreError> {
            std::future::pending().await
        }

        async fn transact_write(&self, _: Vec<WriteOp>) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_calls_time_out() {
        let store = TimeoutStore::new(Stalled, Duration::from_millis(50));
        assert_eq!(store.point_read("t", "k").await, Err(StoreError::Timeout));
        assert_eq!(store.transact_write(Vec::new()).await, Err(StoreError::Timeout));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let store = TimeoutStore::new(super::super::MemoryStore::new(), Duration::from_secs(1));
        store.inner().create_table("t").await.unwrap();
        assert_eq!(store.point_read("t", "k").await, Ok(None));
    }
}
