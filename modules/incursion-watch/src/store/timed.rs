use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::KvStore;
use crate::error::{StoreError, StoreResult};

/// Bounds every call on the inner store. A call that outlives the timeout
/// fails with `StoreError::Unavailable`, which callers already treat as a miss.
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: KvStore> TimedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        key: &str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{op} {key} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl<S: KvStore> KvStore for TimedStore<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.bounded("get", key, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.bounded("set", key, self.inner.set(key, value)).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        self.bounded("set_add", key, self.inner.set_add(key, member))
            .await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        self.bounded("set_remove", key, self.inner.set_remove(key, member))
            .await
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        self.bounded("set_members", key, self.inner.set_members(key))
            .await
    }
}
