//! Content-addressed version tokens
//!
//! A [`VersionToken`] is the SHA-256 of an artifact's exact bytes, hex encoded.
//! Two reads of unchanged bytes yield the same token; any byte change yields a
//! different one.

#![forbid(unsafe_code)]

pub mod error;
pub mod token;

pub use error::{HashError, Result};
pub use token::{VersionToken, hash, verify};
