use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::KvStore;
use crate::error::StoreResult;

/// In-memory store. Thread-safe; contents die with the process.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently holding a value (for test assertions).
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        sets.entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(set) = sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        let sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sets.get(key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("esi:names:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_value() {
        let store = MemoryStore::new();
        store.set("incursions", b"[]").await.unwrap();
        store.set("incursions", b"[1]").await.unwrap();
        assert_eq!(store.get("incursions").await.unwrap(), Some(b"[1]".to_vec()));
    }

    #[tokio::test]
    async fn set_membership_add_and_remove() {
        let store = MemoryStore::new();
        store.set_add("bot:guilds", "g1").await.unwrap();
        store.set_add("bot:guilds", "g2").await.unwrap();
        store.set_add("bot:guilds", "g1").await.unwrap();
        assert_eq!(store.set_members("bot:guilds").await.unwrap().len(), 2);

        store.set_remove("bot:guilds", "g1").await.unwrap();
        let members = store.set_members("bot:guilds").await.unwrap();
        assert!(members.contains("g2"));
        assert!(!members.contains("g1"));

        store.set_remove("bot:guilds", "missing").await.unwrap();
        assert!(store.set_members("nope").await.unwrap().is_empty());
    }
}
