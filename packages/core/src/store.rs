//! Key-value store for raw query responses.
//!
//! Responses are cached by their request URL so a restarted process can
//! show the last known data before its first fetch completes. Each key is
//! only ever written by the query that owns that URL, so stores need no
//! cross-key transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::QueryError;

#[async_trait]
pub trait KvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, QueryError>;

    /// Insert or overwrite the value stored under `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), QueryError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, QueryError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), QueryError> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let store = MemoryKvStore::new();
        store.set("k", json!(1)).await.unwrap();
        store.set("k", json!(2)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
        assert_eq!(store.len().await, 1);
    }
}
