//! Concourse resource for a three-tier certificate authority
//!
//! One binary serves three resource kinds. A root CA is self-signed; an
//! intermediate CA is signed by the root found at the same prefix; a leaf is
//! signed by the intermediate. Certificates and keys live in an object store
//! as `{stem}.pem` / `{stem}-key.pem`, and the SHA-256 of the stored
//! certificate is the resource version.
//!
//! - `check` reports the current version when it differs from the last one seen
//! - `in` materialises the requested version into a directory
//! - `out` creates (guarded against overwrite) or renews a certificate

#![forbid(unsafe_code)]

pub mod chain;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod kind;
pub mod payload;

pub use chain::TrustChain;
pub use config::{Action, CaParams, InParams, LeafParams, OutParams, SourceConfig};
pub use controller::ResourceController;
pub use error::{ResourceError, Result};
pub use kind::ResourceKind;
pub use payload::{
    CheckRequest, InRequest, MetadataField, OutRequest, Version, VersionResponse,
};
