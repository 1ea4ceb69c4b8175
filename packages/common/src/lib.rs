//! Common infrastructure for the certchain crates
//!
//! This crate provides shared functionality used across the store, signing and
//! resource crates:
//! - PEM artifact types (certificates, private keys, signing requests)
//! - Object naming for the `{stem}.pem` / `{stem}-key.pem` layout
//! - Logging bootstrap writing to the error stream

pub mod artifact;
pub mod error;

pub use artifact::{ArtifactKind, CertificateArtifact};
pub use error::{ArtifactError, LoggingTransformer, Result};
