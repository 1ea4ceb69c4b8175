//! Certificate signing engines
//!
//! A [`SigningEngine`] turns a declarative [`CertificateRequest`] into a
//! certificate and private key, signing it either with a freshly generated
//! key (root) or with a parent CA's material held in memory for the duration
//! of the call (intermediate and leaf). Renewal re-signs an existing
//! certificate with its existing key.
//!
//! Two engines are provided:
//!
//! - [`CfsslEngine`] drives the `cfssl` binary; key material reaches the
//!   child process only through its environment.
//! - [`LocalEngine`] issues certificates in process with `rcgen`.

#![forbid(unsafe_code)]

pub mod cfssl;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod inspect;
pub mod local;
pub mod request;

pub use cfssl::{CfsslConfig, CfsslEngine};
pub use engine::{CertificateRole, IssuedCertificate, IssuerMaterial, SigningEngine};
pub use error::{Result, SigningError};
pub use expiry::Expiry;
pub use inspect::{CertificateInfo, verify_issued_by};
pub use local::LocalEngine;
pub use request::{
    CertificateRequest, KeyAlgorithm, KeySpec, RenewalOverrides, RenewalRequest, SubjectName,
    Usage,
};
