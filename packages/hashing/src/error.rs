//! Error handling for version tokens

use thiserror::Error;

/// Hashing-specific errors
#[derive(Debug, Error)]
pub enum HashError {
    /// Text that is not a 64-character hex digest
    #[error("invalid version token '{0}': expected 64 lowercase hex characters")]
    InvalidToken(String),

    /// Bytes do not hash to the recorded checksum
    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        /// Recorded checksum
        expected: String,
        /// Checksum of the bytes read
        actual: String,
    },
}

/// Result type for hashing operations
pub type Result<T> = std::result::Result<T, HashError>;
