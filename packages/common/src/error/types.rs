//! Core error types and definitions

use thiserror::Error;

use crate::artifact::ArtifactKind;

/// Errors raised while validating PEM artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The bytes are not PEM at all
    #[error("{kind} is not valid PEM: {reason}")]
    InvalidPem {
        /// Which artifact was being read
        kind: ArtifactKind,
        /// Parser diagnostic
        reason: String,
    },

    /// PEM parsed but carries the wrong block label
    #[error("expected {kind} PEM block, found '{found}'")]
    UnexpectedLabel {
        /// Which artifact was expected
        kind: ArtifactKind,
        /// Label actually present
        found: String,
    },

    /// PEM parsed but holds no blocks
    #[error("{0} PEM contains no blocks")]
    Empty(ArtifactKind),
}

/// Result type for artifact operations
pub type Result<T> = std::result::Result<T, ArtifactError>;
