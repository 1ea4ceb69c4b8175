//! The signing engine seam

use std::fmt;

use async_trait::async_trait;
use certchain_common::CertificateArtifact;

use crate::Result;
use crate::request::{CertificateRequest, RenewalRequest};

/// Position of a certificate in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateRole {
    /// Self-signed trust anchor
    Root,
    /// CA signed by the root
    Intermediate,
    /// End-entity certificate
    Leaf,
}

impl CertificateRole {
    /// Maximum number of CAs allowed below this one; `None` for a leaf
    #[must_use]
    pub fn path_len(self) -> Option<u8> {
        match self {
            Self::Root => Some(1),
            Self::Intermediate => Some(0),
            Self::Leaf => None,
        }
    }

    /// Whether certificates in this role may sign others
    #[must_use]
    pub fn is_ca(self) -> bool {
        self.path_len().is_some()
    }
}

impl fmt::Display for CertificateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Root => "root ca",
            Self::Intermediate => "intermediate ca",
            Self::Leaf => "leaf",
        })
    }
}

/// An issuing CA's certificate and private key, held only for one call
#[derive(Debug, Clone)]
pub struct IssuerMaterial {
    /// Issuer certificate
    pub certificate: CertificateArtifact,
    /// Issuer private key
    pub key: CertificateArtifact,
}

/// Output of a create operation
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// Signed certificate
    pub certificate: CertificateArtifact,
    /// Freshly generated private key
    pub key: CertificateArtifact,
    /// The request that was signed, for two-phase issuance
    pub csr: Option<CertificateArtifact>,
}

/// Issues and renews certificates
///
/// Engine failures surface as `SigningError::Engine` carrying the engine's
/// own diagnostic text.
#[async_trait]
pub trait SigningEngine: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Self-signed root CA with a fresh key
    async fn create_root(&self, request: &CertificateRequest) -> Result<IssuedCertificate>;

    /// Intermediate CA: fresh key and CSR, signed by the root
    async fn create_intermediate(
        &self,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate>;

    /// Leaf certificate with usages and hosts: fresh key and CSR, signed by
    /// the intermediate
    async fn create_leaf(
        &self,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate>;

    /// Re-sign an existing certificate with its existing key
    async fn renew(&self, request: &RenewalRequest) -> Result<CertificateArtifact>;
}
