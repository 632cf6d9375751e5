//! In-memory storage adapter.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{StorageAdapter, StorageError};

/// Process-memory [`StorageAdapter`] backed by a concurrent hash map.
///
/// The default medium when the host configures nothing else, and the medium
/// of choice for memory-only sessions where artifacts must not outlive the
/// process. Every operation is infallible; the error type exists only to
/// satisfy the trait contract.
#[derive(Debug, Default)]
pub struct InMemoryAdapter {
    entries: DashMap<String, String>,
}

impl InMemoryAdapter {
    /// Creates an empty adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StorageAdapter for InMemoryAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.contains_key(key))
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let adapter = InMemoryAdapter::new();
        adapter.set("auric.test.key", "value").await.unwrap();

        assert_eq!(
            adapter.get("auric.test.key").await.unwrap(),
            Some("value".to_string())
        );
        assert!(adapter.contains("auric.test.key").await.unwrap());
        assert_eq!(adapter.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let adapter = InMemoryAdapter::new();
        assert_eq!(adapter.get("absent").await.unwrap(), None);
        assert!(!adapter.contains("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let adapter = InMemoryAdapter::new();
        adapter.set("key", "first").await.unwrap();
        adapter.set("key", "second").await.unwrap();

        assert_eq!(adapter.get("key").await.unwrap(), Some("second".to_string()));
        assert_eq!(adapter.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let adapter = InMemoryAdapter::new();
        adapter.set("key", "value").await.unwrap();

        adapter.remove("key").await.unwrap();
        adapter.remove("key").await.unwrap();

        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_keys_enumerates_live_entries() {
        let adapter = InMemoryAdapter::new();
        adapter.set("a", "1").await.unwrap();
        adapter.set("b", "2").await.unwrap();
        adapter.set("c", "3").await.unwrap();
        adapter.remove("b").await.unwrap();

        let mut keys = adapter.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "c".to_string()]);
    }
}
