//! Error handling for signing engines

use certchain_common::ArtifactError;
use thiserror::Error;

/// Signing-specific errors
#[derive(Debug, Error)]
pub enum SigningError {
    /// The request cannot be issued as given
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),

    /// The engine rejected the request; `diagnostic` is its raw output
    #[error("{engine} failed: {diagnostic}")]
    Engine {
        /// Engine name
        engine: &'static str,
        /// Raw engine output
        diagnostic: String,
    },

    /// The engine does not support the requested operation or key
    #[error("{engine} does not support {what}")]
    Unsupported {
        /// Engine name
        engine: &'static str,
        /// Unsupported operation or key
        what: String,
    },

    /// The engine did not finish within its timeout
    #[error("{engine} timed out after {seconds}s")]
    Timeout {
        /// Engine name
        engine: &'static str,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// The engine binary could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Executable that failed to start
        program: String,
        /// Spawn failure
        #[source]
        source: std::io::Error,
    },

    /// The engine exited cleanly but its output could not be understood
    #[error("unexpected {engine} output: {reason}")]
    Output {
        /// Engine name
        engine: &'static str,
        /// What was wrong with the output
        reason: String,
    },

    /// A certificate could not be parsed for inspection
    #[error("certificate inspection failed: {0}")]
    Inspect(String),

    /// A PEM artifact was malformed
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SigningError {
    /// Whether retrying the same call may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<rcgen::Error> for SigningError {
    fn from(err: rcgen::Error) -> Self {
        Self::Engine {
            engine: "rcgen",
            diagnostic: err.to_string(),
        }
    }
}

/// Result type for signing operations
pub type Result<T> = std::result::Result<T, SigningError>;
