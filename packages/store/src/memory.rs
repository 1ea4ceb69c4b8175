//! In-memory object store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::traits::{ObjectMetadata, ObjectStore, StoredObject};
use crate::{Result, StoreError};

/// Object store backed by a map, for tests and dry runs
///
/// Every successful `put` is appended to a write log so callers can assert
/// write ordering.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    writes: RwLock<Vec<String>>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys written so far, oldest first
    pub async fn write_log(&self) -> Vec<String> {
        self.writes.read().await.clone()
    }

    /// Replace an object's bytes without touching its metadata
    ///
    /// Simulates out-of-band modification of the bucket.
    pub async fn tamper(&self, key: &str, body: Vec<u8>) -> bool {
        match self.objects.write().await.get_mut(key) {
            Some(object) => {
                object.body = body;
                true
            }
            None => false,
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<StoredObject> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
        overwrite: bool,
    ) -> Result<()> {
        let mut objects = self.objects.write().await;
        if !overwrite && objects.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), StoredObject { body, metadata });
        self.writes.write().await.push(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conditional_put_refuses_existing_key() {
        let store = MemoryStore::new();
        store
            .put("a", b"one".to_vec(), ObjectMetadata::new(), false)
            .await
            .unwrap();
        let err = store
            .put("a", b"two".to_vec(), ObjectMetadata::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.get("a").await.unwrap().body, b"one");
    }

    #[tokio::test]
    async fn overwrite_replaces_and_logs() {
        let store = MemoryStore::new();
        store.put("a", b"one".to_vec(), ObjectMetadata::new(), false).await.unwrap();
        store.put("a", b"two".to_vec(), ObjectMetadata::new(), true).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().body, b"two");
        assert_eq!(store.write_log().await, vec!["a", "a"]);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = MemoryStore::new();
        assert!(!store.exists("nope").await.unwrap());
        assert!(matches!(store.get("nope").await, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn metadata_lookup_ignores_case() {
        let mut metadata = ObjectMetadata::new();
        metadata.insert("SHA256".to_string(), "abc".to_string());
        let object = StoredObject { body: Vec::new(), metadata };
        assert_eq!(object.metadata_value("sha256"), Some("abc"));
    }
}
