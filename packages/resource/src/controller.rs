//! check / in / out for one level of the hierarchy
//!
//! Each call starts from nothing and rebuilds its view of the hierarchy from
//! the store. The certificate's checksum is the resource version.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use certchain_common::{ArtifactKind, CertificateArtifact, LoggingTransformer};
use certchain_hashing::VersionToken;
use certchain_signing::{CertificateInfo, RenewalRequest, SigningEngine};
use certchain_store::{StoreAccessor, StoreError, StoredArtifact};
use log::{debug, info, warn};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::chain::TrustChain;
use crate::config::{Action, InParams, OutParams, SourceConfig};
use crate::kind::{CHAIN_FILE_NAME, INTERMEDIATE_STEM, ROOT_STEM, ResourceKind};
use crate::payload::{MetadataBuilder, Version, VersionResponse};
use crate::{ResourceError, Result};

/// Sub-directory of the destination holding CA files when requested
const CA_SUBDIR: &str = "ca";

/// A file `in` is about to write
struct Materialised {
    description: String,
    directory: PathBuf,
    file_name: String,
    artifact: CertificateArtifact,
    checksum: VersionToken,
}

/// Lifecycle of one resource: a certificate and key under a stem
pub struct ResourceController {
    kind: ResourceKind,
    stem: String,
    store: StoreAccessor,
    engine: Arc<dyn SigningEngine>,
}

impl std::fmt::Debug for ResourceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceController")
            .field("kind", &self.kind)
            .field("stem", &self.stem)
            .field("store", &self.store)
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl ResourceController {
    /// # Errors
    ///
    /// `InvalidRequest` when the source does not name a leaf's stem.
    pub fn new(
        kind: ResourceKind,
        source: &SourceConfig,
        store: StoreAccessor,
        engine: Arc<dyn SigningEngine>,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            stem: source.stem(kind)?,
            store,
            engine,
        })
    }

    /// Level this controller manages
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Object name of the managed certificate
    #[must_use]
    pub fn certificate_name(&self) -> String {
        ArtifactKind::Certificate.file_name(&self.stem)
    }

    /// Object name of the managed private key
    #[must_use]
    pub fn key_name(&self) -> String {
        ArtifactKind::PrivateKey.file_name(&self.stem)
    }

    fn describe(&self, what: &str) -> String {
        format!("{}_{what}", self.kind.description())
    }

    /// Version of the stored certificate, `None` before the first create
    ///
    /// # Errors
    ///
    /// Store failures, including a checksum mismatch.
    pub async fn current_version(&self) -> Result<Option<Version>> {
        let stored = self
            .store
            .get_optional(&self.certificate_name(), ArtifactKind::Certificate)
            .await?;
        Ok(stored.map(|stored| Version::from(stored.checksum)))
    }

    /// Versions newer than `previous`: empty, or exactly the current one
    ///
    /// # Errors
    ///
    /// Store failures only; absence is an empty result.
    pub async fn check(&self, previous: Option<&Version>) -> Result<Vec<Version>> {
        match self.current_version().await? {
            None => {
                info!("no {} certificate stored yet", self.kind);
                Ok(Vec::new())
            }
            Some(current) if previous == Some(&current) => {
                debug!("{} unchanged at {}", self.kind, current.checksum);
                Ok(Vec::new())
            }
            Some(current) => {
                info!(
                    "{} version {}",
                    self.kind,
                    LoggingTransformer::short_checksum(current.checksum.as_str())
                );
                Ok(vec![current])
            }
        }
    }

    /// Materialise the requested version into `destination`
    ///
    /// Everything is read and verified before the first file is written.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing artifact, `VersionUnavailable` when the
    /// stored certificate is no longer `requested`.
    pub async fn fetch(
        &self,
        requested: &Version,
        params: &InParams,
        destination: &Path,
    ) -> Result<VersionResponse> {
        let certificate = self
            .store
            .get(&self.certificate_name(), ArtifactKind::Certificate)
            .await?;
        if certificate.checksum != requested.checksum {
            return Err(ResourceError::VersionUnavailable {
                requested: requested.checksum.to_string(),
                current: certificate.checksum.to_string(),
            });
        }

        let mut files = Vec::new();
        if params.save_certificate {
            files.push(Materialised {
                description: self.describe("certificate"),
                directory: destination.to_path_buf(),
                file_name: self.certificate_name(),
                artifact: certificate.artifact.clone(),
                checksum: certificate.checksum.clone(),
            });
        }
        if params.save_private_key {
            let key = self
                .store
                .get(&self.key_name(), ArtifactKind::PrivateKey)
                .await?;
            files.push(Materialised {
                description: self.describe("private_key"),
                directory: destination.to_path_buf(),
                file_name: self.key_name(),
                artifact: key.artifact,
                checksum: key.checksum,
            });
        }
        if self.kind == ResourceKind::Leaf {
            files.extend(self.ca_files(params, destination).await?);
        } else if params.save_root_ca_certificate
            || params.save_intermediate_ca_certificate
            || params.save_ca_chain
        {
            warn!("CA file parameters apply to leaf resources; ignoring them for a {}", self.kind);
        }

        let mut metadata = MetadataBuilder::new();
        for file in &files {
            write_artifact(&file.directory, &file.file_name, &file.artifact).await?;
            metadata.file(&file.description, &file.file_name, &file.checksum);
        }
        self.certificate_facts(&certificate.artifact, &mut metadata)?;
        info!("fetched {} version {}", self.kind, requested.checksum);

        Ok(metadata.finish(requested.clone()))
    }

    /// Root, intermediate and chain files requested for a leaf
    async fn ca_files(&self, params: &InParams, destination: &Path) -> Result<Vec<Materialised>> {
        let directory = if params.save_to_ca_subdir {
            destination.join(CA_SUBDIR)
        } else {
            destination.to_path_buf()
        };
        let want_root = params.save_root_ca_certificate || params.save_ca_chain;
        let want_intermediate = params.save_intermediate_ca_certificate || params.save_ca_chain;

        let root = if want_root {
            Some(self.ca_certificate(ROOT_STEM).await?)
        } else {
            None
        };
        let intermediate = if want_intermediate {
            Some(self.ca_certificate(INTERMEDIATE_STEM).await?)
        } else {
            None
        };

        let mut files = Vec::new();
        let file = |description: &str, stem: &str, stored: &StoredArtifact| Materialised {
            description: description.to_string(),
            directory: directory.clone(),
            file_name: ArtifactKind::Certificate.file_name(stem),
            artifact: stored.artifact.clone(),
            checksum: stored.checksum.clone(),
        };
        if let (true, Some(root)) = (params.save_root_ca_certificate, &root) {
            files.push(file("root_ca_certificate", ROOT_STEM, root));
        }
        if let (true, Some(intermediate)) = (params.save_intermediate_ca_certificate, &intermediate)
        {
            files.push(file("intermediate_ca_certificate", INTERMEDIATE_STEM, intermediate));
        }
        if let (true, Some(root), Some(intermediate)) = (params.save_ca_chain, &root, &intermediate)
        {
            let chain = assemble_chain(intermediate, root)?;
            files.push(Materialised {
                description: "ca_chain".to_string(),
                directory: directory.clone(),
                file_name: CHAIN_FILE_NAME.to_string(),
                checksum: certchain_hashing::hash(chain.as_bytes()),
                artifact: chain,
            });
        }
        Ok(files)
    }

    async fn ca_certificate(&self, stem: &str) -> Result<StoredArtifact> {
        let name = ArtifactKind::Certificate.file_name(stem);
        self.store
            .get(&name, ArtifactKind::Certificate)
            .await
            .map_err(ResourceError::from)
    }

    /// Create or renew according to `params.action`
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create) and [`renew`](Self::renew).
    pub async fn publish(&self, params: &OutParams) -> Result<VersionResponse> {
        match params.action {
            Action::Create => self.create(params).await,
            Action::Renew => self.renew(params).await,
        }
    }

    /// Issue a new certificate and key
    ///
    /// The key is stored before the certificate, so an interrupted create
    /// never leaves a certificate whose key is lost.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for bad parameters, `AlreadyExists` when a
    /// certificate is stored and `allow_overwrite` is false (the engine is
    /// not called), `MissingParent` without a parent CA, `Signing` when the
    /// engine fails.
    pub async fn create(&self, params: &OutParams) -> Result<VersionResponse> {
        let request = params.certificate_request(self.kind)?;
        request.validate()?;

        let cert_name = self.certificate_name();
        if params.allow_overwrite {
            warn!("allow_overwrite is set; an existing {} will be replaced", self.kind);
        } else if self.store.exists(&cert_name).await? {
            return Err(ResourceError::AlreadyExists(
                self.store.object_key(&cert_name),
            ));
        }

        let chain = TrustChain::resolve(&self.store, self.kind).await?;
        let issued = match (&chain, self.kind) {
            (None, _) => self.engine.create_root(&request).await?,
            (Some(chain), ResourceKind::Intermediate) => {
                self.engine
                    .create_intermediate(&request, &chain.issuer())
                    .await?
            }
            (Some(chain), _) => self.engine.create_leaf(&request, &chain.issuer()).await?,
        };
        info!(
            "{} issued {} {}",
            self.engine.name(),
            self.kind,
            request.common_name
        );

        let key = self.store.put(&self.key_name(), &issued.key, true).await?;
        let certificate = self.store.put(&cert_name, &issued.certificate, true).await?;

        self.respond(&certificate, &key)
    }

    /// Re-sign the stored certificate with its stored key
    ///
    /// Only the certificate is written back; the key bytes are untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` before the first create, `MissingParent` when the issuing
    /// CA is gone, `Signing` when the engine fails.
    pub async fn renew(&self, params: &OutParams) -> Result<VersionResponse> {
        let overrides = params.renewal_overrides(self.kind);

        let cert_name = self.certificate_name();
        let key_name = self.key_name();
        let (certificate, key) = tokio::join!(
            self.store.get_optional(&cert_name, ArtifactKind::Certificate),
            self.store.get_optional(&key_name, ArtifactKind::PrivateKey),
        );
        let not_found = |name: &str| {
            ResourceError::NotFound(format!(
                "{} (renew requires a previously created {})",
                self.store.object_key(name),
                self.kind
            ))
        };
        let certificate = certificate?.ok_or_else(|| not_found(&cert_name))?;
        let key = key?.ok_or_else(|| not_found(&key_name))?;

        let before = CertificateInfo::from_artifact(&certificate.artifact)?;
        LoggingTransformer::log_certificate_facts(
            &format!("{} before renewal", self.kind),
            &before.common_name,
            before.time_until_expiration(),
        );

        let chain = TrustChain::resolve(&self.store, self.kind).await?;
        let renewed = self
            .engine
            .renew(&RenewalRequest {
                role: self.kind.role(),
                certificate: certificate.artifact.clone(),
                key: key.artifact.clone(),
                issuer: chain.as_ref().map(TrustChain::issuer),
                overrides,
            })
            .await?;

        let after = CertificateInfo::from_artifact(&renewed)?;
        LoggingTransformer::log_certificate_facts(
            &format!("{} after renewal", self.kind),
            &after.common_name,
            after.time_until_expiration(),
        );

        let stored = self.store.put(&cert_name, &renewed, true).await?;
        self.respond(&stored, &key)
    }

    fn respond(
        &self,
        certificate: &StoredArtifact,
        key: &StoredArtifact,
    ) -> Result<VersionResponse> {
        let mut metadata = MetadataBuilder::new();
        metadata.file(
            &self.describe("certificate"),
            &self.certificate_name(),
            &certificate.checksum,
        );
        metadata.file(&self.describe("private_key"), &self.key_name(), &key.checksum);
        self.certificate_facts(&certificate.artifact, &mut metadata)?;
        Ok(metadata.finish(Version::from(certificate.checksum.clone())))
    }

    /// Common name, hosts (leaf) and remaining validity
    fn certificate_facts(
        &self,
        certificate: &CertificateArtifact,
        metadata: &mut MetadataBuilder,
    ) -> Result<()> {
        let info = CertificateInfo::from_artifact(certificate)?;
        let description = self.describe("certificate");
        let remaining = info.time_until_expiration();
        LoggingTransformer::log_certificate_facts(
            &description.replace('_', " "),
            &info.common_name,
            remaining,
        );

        metadata.common_name(&description, &info.common_name);
        if self.kind == ResourceKind::Leaf {
            metadata.hosts(&description, &info.hosts);
        }
        metadata.time_until_expiration(&description, remaining);
        Ok(())
    }
}

/// CA chain file contents: the intermediate followed by the root
///
/// Both inputs come from the store, so a failure here means a stored object
/// is not the certificate its key promises.
fn assemble_chain(intermediate: &StoredArtifact, root: &StoredArtifact) -> Result<CertificateArtifact> {
    CertificateArtifact::chain([&intermediate.artifact, &root.artifact]).map_err(|source| {
        let key = if intermediate.artifact.kind() == ArtifactKind::Certificate {
            root.key.clone()
        } else {
            intermediate.key.clone()
        };
        ResourceError::from(StoreError::Artifact { key, source })
    })
}

/// Write an artifact's exact bytes; private keys are owner-readable only
async fn write_artifact(directory: &Path, file_name: &str, artifact: &CertificateArtifact) -> Result<()> {
    tokio::fs::create_dir_all(directory).await?;
    let path = directory.join(file_name);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    if artifact.kind() == ArtifactKind::PrivateKey {
        owner_only(&mut options);
    }
    let mut file = options.open(&path).await?;
    file.write_all(artifact.as_bytes()).await?;
    file.flush().await?;
    debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(unix)]
fn owner_only(options: &mut OpenOptions) {
    options.mode(0o600);
}

#[cfg(not(unix))]
fn owner_only(_options: &mut OpenOptions) {}
