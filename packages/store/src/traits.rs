//! Traits for object storage backends

use std::collections::HashMap;

use async_trait::async_trait;

use crate::Result;

/// User metadata attached to an object (`x-amz-meta-*` on S3)
pub type ObjectMetadata = HashMap<String, String>;

/// An object read back from a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    /// Object bytes
    pub body: Vec<u8>,
    /// User metadata
    pub metadata: ObjectMetadata,
}

impl StoredObject {
    /// Metadata lookup ignoring key case
    ///
    /// Providers disagree on how they case user metadata keys.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Base trait for all object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; `StoreError::NotFound` when absent
    async fn get(&self, key: &str) -> Result<StoredObject>;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Write an object
    ///
    /// With `overwrite == false` the write must not replace an existing
    /// object and fails with `StoreError::AlreadyExists` instead.
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
        overwrite: bool,
    ) -> Result<()>;
}
