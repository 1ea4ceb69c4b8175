//! Object store access for certificate artifacts
//!
//! [`ObjectStore`] is the narrow get/exists/put surface a backend provides.
//! [`StoreAccessor`] sits on top of it, resolving object names under a
//! prefix, attaching `sha256` metadata on write and verifying it on read.
//!
//! Two backends ship with the crate: [`S3Store`] for S3 and S3-compatible
//! providers (static credentials or an assumed role), and [`MemoryStore`]
//! for tests.

#![forbid(unsafe_code)]

pub mod accessor;
pub mod error;
pub mod memory;
pub mod s3;
pub mod traits;

pub use accessor::{CHECKSUM_METADATA_KEY, StoreAccessor, StoredArtifact};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use s3::{RoleConfig, S3Config, S3Store, StaticCredentials};
pub use traits::{ObjectMetadata, ObjectStore, StoredObject};
