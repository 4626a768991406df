//! Persistent key-value tier.
//!
//! Implemented by `PostgresStore` (production) and `MemoryStore` (tests and
//! database-less runs). Values are opaque bytes; callers own serialization.
//! The binary wraps whichever it opens in `TimedStore`.

mod memory;
mod postgres;
mod timed;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use timed::TimedStore;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` when the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()>;

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()>;

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>>;
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        (**self).set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        (**self).set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        (**self).set_members(key).await
    }
}
