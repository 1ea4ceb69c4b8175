//! Error handling for resource invocations

use certchain_signing::SigningError;
use certchain_store::StoreError;
use thiserror::Error;

/// Every way a check, in or out invocation can fail
///
/// All variants are terminal: the binary prints the message and exits
/// non-zero. Only `StoreIo` may be worth retrying.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A required artifact is absent from the store
    #[error("not found: {0}")]
    NotFound(String),

    /// Create refused because the artifact exists and overwrite is not allowed
    #[error("{0} already exists; set allow_overwrite to replace it")]
    AlreadyExists(String),

    /// The parent CA level has not been created at this prefix
    #[error("cannot issue {child}: parent {parent} not found at {key}")]
    MissingParent {
        /// Level being issued
        child: &'static str,
        /// Level that was expected to sign it
        parent: &'static str,
        /// Object key that was looked up
        key: String,
    },

    /// The signing engine rejected the request; carries its diagnostic
    #[error(transparent)]
    Signing(SigningError),

    /// Network, credential, permission or integrity failure against the store
    #[error("store failure: {source}")]
    StoreIo {
        /// Underlying store failure
        #[source]
        source: StoreError,
        /// Whether the failure is transient
        retryable: bool,
    },

    /// Malformed parameters or certificate request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// `in` was asked for a version that is no longer the stored one
    #[error("requested version {requested} is unavailable (current: {current})")]
    VersionUnavailable {
        /// Checksum the orchestrator asked for
        requested: String,
        /// Checksum of the stored certificate
        current: String,
    },

    /// Local filesystem failure in the working directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON envelope on stdin/stdout could not be handled
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ResourceError {
    /// Whether retrying the invocation may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreIo { retryable, .. } => *retryable,
            Self::Signing(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<StoreError> for ResourceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::AlreadyExists(key) => Self::AlreadyExists(key),
            other => Self::StoreIo {
                retryable: other.is_retryable(),
                source: other,
            },
        }
    }
}

impl From<SigningError> for ResourceError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::InvalidRequest(reason) => Self::InvalidRequest(reason),
            other => Self::Signing(other),
        }
    }
}

/// Result type for resource invocations
pub type Result<T> = std::result::Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_timeout_is_a_retryable_store_failure() {
        let err = ResourceError::from(StoreError::Timeout {
            operation: "get",
            key: "pki/root-ca.pem".to_string(),
            seconds: 1,
        });
        assert!(matches!(
            err,
            ResourceError::StoreIo {
                retryable: true,
                source: StoreError::Timeout { operation: "get", .. },
            }
        ));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("pki/root-ca.pem"));
    }

    #[test]
    fn missing_and_existing_keys_keep_their_own_variants() {
        let missing = ResourceError::from(StoreError::NotFound("pki/root-ca.pem".to_string()));
        assert!(matches!(missing, ResourceError::NotFound(ref key) if key == "pki/root-ca.pem"));
        assert!(!missing.is_retryable());

        let existing = ResourceError::from(StoreError::AlreadyExists("pki/root-ca.pem".to_string()));
        assert!(matches!(existing, ResourceError::AlreadyExists(_)));
        assert!(!existing.is_retryable());
    }
}
