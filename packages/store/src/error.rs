//! Error handling for object store access

use certchain_common::ArtifactError;
use certchain_hashing::HashError;
use thiserror::Error;

/// Store-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object at the key
    #[error("object not found: {0}")]
    NotFound(String),

    /// Conditional put refused because the key is taken
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// Transport, permission or provider failure
    #[error("{operation} {key} failed: {message}")]
    Io {
        /// Store operation
        operation: &'static str,
        /// Object key
        key: String,
        /// Provider error text
        message: String,
        /// Whether the failure is transient
        retryable: bool,
    },

    /// The store did not answer within the configured timeout
    #[error("{operation} {key} timed out after {seconds}s")]
    Timeout {
        /// Store operation
        operation: &'static str,
        /// Object key
        key: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Stored bytes no longer match the checksum recorded at write time
    #[error("object {key} is corrupt: {source}")]
    Corrupt {
        /// Object key
        key: String,
        /// Checksum failure
        #[source]
        source: HashError,
    },

    /// Invalid backend configuration
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// Object content is not the PEM document expected at the key
    #[error("object {key} is not a valid artifact: {source}")]
    Artifact {
        /// Object key
        key: String,
        /// Parse failure
        #[source]
        source: ArtifactError,
    },
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
