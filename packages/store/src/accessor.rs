//! Prefix-aware artifact access with checksum metadata

use std::sync::Arc;

use certchain_common::{ArtifactKind, CertificateArtifact, LoggingTransformer};
use certchain_hashing::VersionToken;
use log::debug;

use crate::traits::{ObjectMetadata, ObjectStore};
use crate::{Result, StoreError};

/// Metadata key holding the hex SHA-256 of the object body
pub const CHECKSUM_METADATA_KEY: &str = "sha256";

/// An artifact read from or written to the store
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// Full object key, prefix included
    pub key: String,
    /// The PEM document
    pub artifact: CertificateArtifact,
    /// Checksum of the stored bytes
    pub checksum: VersionToken,
}

/// Reads and writes PEM artifacts under a key prefix
#[derive(Clone)]
pub struct StoreAccessor {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl std::fmt::Debug for StoreAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAccessor")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl StoreAccessor {
    /// Surrounding slashes in `prefix` are ignored
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<&str>) -> Self {
        let prefix = prefix.unwrap_or_default().trim_matches('/').to_string();
        Self { store, prefix }
    }

    /// `{prefix}/{name}`, or just `name` without a prefix
    #[must_use]
    pub fn object_key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.prefix)
        }
    }

    /// Whether an object named `name` exists under the prefix
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.store.exists(&self.object_key(name)).await
    }

    /// Fetch and validate an artifact
    ///
    /// When the object carries checksum metadata the body must match it.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when absent, `StoreError::Corrupt` on a
    /// checksum mismatch, `StoreError::Artifact` when the body is not a PEM
    /// document of `kind`.
    pub async fn get(&self, name: &str, kind: ArtifactKind) -> Result<StoredArtifact> {
        let key = self.object_key(name);
        let object = self.store.get(&key).await?;

        let checksum = match object.metadata_value(CHECKSUM_METADATA_KEY) {
            Some(recorded) => certchain_hashing::verify(&object.body, recorded).map_err(|source| {
                StoreError::Corrupt {
                    key: key.clone(),
                    source,
                }
            })?,
            None => {
                debug!("{key} has no {CHECKSUM_METADATA_KEY} metadata, skipping verification");
                certchain_hashing::hash(&object.body)
            }
        };

        let artifact = CertificateArtifact::from_pem(kind, object.body).map_err(|source| {
            StoreError::Artifact {
                key: key.clone(),
                source,
            }
        })?;

        LoggingTransformer::log_artifact_checksum(&kind.to_string(), &key, checksum.as_str());

        Ok(StoredArtifact {
            key,
            artifact,
            checksum,
        })
    }

    /// Like [`get`](Self::get), mapping absence to `None`
    ///
    /// # Errors
    ///
    /// Any failure other than `NotFound`.
    pub async fn get_optional(
        &self,
        name: &str,
        kind: ArtifactKind,
    ) -> Result<Option<StoredArtifact>> {
        match self.get(name, kind).await {
            Ok(stored) => Ok(Some(stored)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Write an artifact with its checksum recorded as metadata
    ///
    /// # Errors
    ///
    /// `StoreError::AlreadyExists` when `overwrite` is false and the key is
    /// taken; backend failures otherwise.
    pub async fn put(
        &self,
        name: &str,
        artifact: &CertificateArtifact,
        overwrite: bool,
    ) -> Result<StoredArtifact> {
        let key = self.object_key(name);
        let checksum = certchain_hashing::hash(artifact.as_bytes());

        let mut metadata = ObjectMetadata::new();
        metadata.insert(CHECKSUM_METADATA_KEY.to_string(), checksum.to_string());

        self.store
            .put(&key, artifact.as_bytes().to_vec(), metadata, overwrite)
            .await?;
        LoggingTransformer::log_artifact_checksum(
            &format!("stored {}", artifact.kind()),
            &key,
            checksum.as_str(),
        );

        Ok(StoredArtifact {
            key,
            artifact: artifact.clone(),
            checksum,
        })
    }
}
