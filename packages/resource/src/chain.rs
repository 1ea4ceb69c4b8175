//! Parent CA resolution

use certchain_common::ArtifactKind;
use certchain_signing::IssuerMaterial;
use certchain_store::{StoreAccessor, StoredArtifact};
use log::debug;

use crate::kind::ResourceKind;
use crate::{ResourceError, Result};

/// The parent CA's signing material, read fresh for one invocation
#[derive(Debug, Clone)]
pub struct TrustChain {
    /// Level that signs the resource
    pub parent: ResourceKind,
    /// Parent certificate as stored
    pub certificate: StoredArtifact,
    /// Parent private key as stored
    pub key: StoredArtifact,
}

impl TrustChain {
    /// Resolve the CA that signs `child` at the accessor's prefix
    ///
    /// Returns `Ok(None)` for a root, which has no parent.
    ///
    /// # Errors
    ///
    /// `MissingParent` when either half of the parent's key pair is absent;
    /// store failures otherwise.
    pub async fn resolve(store: &StoreAccessor, child: ResourceKind) -> Result<Option<Self>> {
        let Some(parent) = child.parent() else {
            return Ok(None);
        };
        let stem = parent.fixed_stem().unwrap_or_default();
        let cert_name = ArtifactKind::Certificate.file_name(stem);
        let key_name = ArtifactKind::PrivateKey.file_name(stem);

        let (certificate, key) = tokio::join!(
            store.get_optional(&cert_name, ArtifactKind::Certificate),
            store.get_optional(&key_name, ArtifactKind::PrivateKey),
        );
        let missing = |name: &str| ResourceError::MissingParent {
            child: child.label(),
            parent: parent.label(),
            key: store.object_key(name),
        };
        let certificate = certificate?.ok_or_else(|| missing(&cert_name))?;
        let key = key?.ok_or_else(|| missing(&key_name))?;
        debug!("resolved {parent} for {child} at {}", certificate.key);

        Ok(Some(Self {
            parent,
            certificate,
            key,
        }))
    }

    /// Key pair handed to the signing engine
    #[must_use]
    pub fn issuer(&self) -> IssuerMaterial {
        IssuerMaterial {
            certificate: self.certificate.artifact.clone(),
            key: self.key.artifact.clone(),
        }
    }
}
