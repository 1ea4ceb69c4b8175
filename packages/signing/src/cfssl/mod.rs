//! cfssl signing engine
//!
//! Roots come from `gencert -initca`; intermediates and leaves are a
//! `genkey` followed by `sign` against the parent CA. Private keys are
//! passed to cfssl as `env:` references so they never touch the disk.

mod command;
mod json;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use certchain_common::CertificateArtifact;
use log::{debug, info};

use crate::engine::{CertificateRole, IssuedCertificate, IssuerMaterial, SigningEngine};
use crate::expiry::Expiry;
use crate::inspect::CertificateInfo;
use crate::request::{CertificateRequest, KeyAlgorithm, KeySpec, RenewalRequest, Usage};
use crate::{Result, SigningError};
use command::EnvSecret;
use json::{CsrDocument, profile_name, signing_config};
use output::EngineOutput;

pub(crate) const ENGINE: &str = "cfssl";

const CA_CERT_ENV: &str = "CERTCHAIN_CA_CERT";
const CA_KEY_ENV: &str = "CERTCHAIN_CA_KEY";
const OWN_KEY_ENV: &str = "CERTCHAIN_KEY";

/// Where to find cfssl and how long to wait for it
#[derive(Debug, Clone)]
pub struct CfsslConfig {
    /// Path or name of the cfssl executable
    pub binary: PathBuf,
    /// Bound on each invocation
    pub timeout: Duration,
}

impl Default for CfsslConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("cfssl"),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Signing engine backed by the cfssl command-line tool
#[derive(Debug, Clone, Default)]
pub struct CfsslEngine {
    config: CfsslConfig,
}

impl CfsslEngine {
    /// Engine using `config`
    #[must_use]
    pub fn new(config: CfsslConfig) -> Self {
        Self { config }
    }

    fn serialize(doc: &CsrDocument<'_>) -> Result<Vec<u8>> {
        let bytes = doc.to_bytes().map_err(|e| SigningError::Output {
            engine: ENGINE,
            reason: format!("cannot encode request: {e}"),
        })?;
        debug!("{ENGINE} request: {}", String::from_utf8_lossy(&bytes));
        Ok(bytes)
    }

    /// Sign `csr` with the issuer under a one-off profile for `role`
    async fn sign(
        &self,
        role: CertificateRole,
        csr: &CertificateArtifact,
        issuer: &IssuerMaterial,
        expiry: Expiry,
        usages: &[Usage],
    ) -> Result<CertificateArtifact> {
        let scratch = tempfile::tempdir()?;
        let config_path = scratch.path().join("signing-config.json");
        let profile = signing_config(role, expiry, usages);
        tokio::fs::write(&config_path, profile.to_string()).await?;

        let secrets = [
            EnvSecret {
                name: CA_CERT_ENV,
                value: issuer.certificate.as_str(),
            },
            EnvSecret {
                name: CA_KEY_ENV,
                value: issuer.key.as_str(),
            },
        ];
        let ca = secrets[0].reference();
        let ca_key = secrets[1].reference();
        let config_arg = config_path.display().to_string();
        let args = [
            "sign",
            "-ca",
            ca.as_str(),
            "-ca-key",
            ca_key.as_str(),
            "-config",
            config_arg.as_str(),
            "-profile",
            profile_name(role),
            "-",
        ];

        let stdout = command::run(&self.config, &args, csr.as_bytes(), &secrets).await?;
        EngineOutput::parse(&stdout)?.require_cert()
    }

    async fn create_child(
        &self,
        role: CertificateRole,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate> {
        request.validate()?;
        let hosts: &[String] = if role == CertificateRole::Leaf {
            &request.hosts
        } else {
            &[]
        };
        let doc = CsrDocument::new(&request.common_name, request.key, request.subject.as_ref())
            .with_hosts(hosts);

        let input = Self::serialize(&doc)?;
        let stdout = command::run(&self.config, &["genkey", "-"], &input, &[]).await?;
        let mut generated = EngineOutput::parse(&stdout)?;
        let key = generated.require_key()?;
        let csr = generated.require_csr()?;

        let certificate = self
            .sign(role, &csr, issuer, request.expiry, &request.effective_usages())
            .await?;
        info!("{ENGINE}: issued {role} {}", request.common_name);

        Ok(IssuedCertificate {
            certificate,
            key,
            csr: Some(csr),
        })
    }
}

/// Key spec recorded in a certificate, for re-generating its CSR
fn key_spec_of(info: &CertificateInfo) -> KeySpec {
    let size = u32::try_from(info.key_bits).unwrap_or_default();
    match info.key_algorithm.as_str() {
        "ecdsa" => KeySpec::ecdsa(size),
        _ => KeySpec {
            algo: KeyAlgorithm::Rsa,
            size,
        },
    }
}

#[async_trait]
impl SigningEngine for CfsslEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn create_root(&self, request: &CertificateRequest) -> Result<IssuedCertificate> {
        request.validate()?;
        let path_len = CertificateRole::Root.path_len().unwrap_or_default();
        let doc = CsrDocument::new(&request.common_name, request.key, request.subject.as_ref())
            .with_ca(request.expiry, path_len);

        let stdout = command::run(
            &self.config,
            &["gencert", "-initca", "-"],
            &Self::serialize(&doc)?,
            &[],
        )
        .await?;
        let mut output = EngineOutput::parse(&stdout)?;
        info!("{ENGINE}: issued self-signed root {}", request.common_name);

        Ok(IssuedCertificate {
            certificate: output.require_cert()?,
            key: output.require_key()?,
            csr: output.csr.take(),
        })
    }

    async fn create_intermediate(
        &self,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate> {
        self.create_child(CertificateRole::Intermediate, request, issuer)
            .await
    }

    async fn create_leaf(
        &self,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate> {
        self.create_child(CertificateRole::Leaf, request, issuer).await
    }

    async fn renew(&self, request: &RenewalRequest) -> Result<CertificateArtifact> {
        request.validate()?;

        let Some(issuer) = &request.issuer else {
            // Self-signed: cfssl re-signs the CA with its own key
            let secrets = [
                EnvSecret {
                    name: CA_CERT_ENV,
                    value: request.certificate.as_str(),
                },
                EnvSecret {
                    name: CA_KEY_ENV,
                    value: request.key.as_str(),
                },
            ];
            let ca = secrets[0].reference();
            let ca_key = secrets[1].reference();
            let args = ["gencert", "-renewca", "-ca", ca.as_str(), "-ca-key", ca_key.as_str()];
            let stdout = command::run(&self.config, &args, &[], &secrets).await?;
            return EngineOutput::parse(&stdout)?.require_cert();
        };

        let current = CertificateInfo::from_artifact(&request.certificate)?;
        let overrides = &request.overrides;
        let hosts: &[String] = if request.role == CertificateRole::Leaf {
            overrides.hosts.as_deref().unwrap_or(&current.hosts)
        } else {
            &[]
        };
        let doc = CsrDocument::new(
            &current.common_name,
            key_spec_of(&current),
            Some(&current.subject),
        )
        .with_hosts(hosts);

        let secret = [EnvSecret {
            name: OWN_KEY_ENV,
            value: request.key.as_str(),
        }];
        let key_ref = secret[0].reference();
        let stdout = command::run(
            &self.config,
            &["gencsr", "-key", key_ref.as_str(), "-"],
            &Self::serialize(&doc)?,
            &secret,
        )
        .await?;
        let csr = EngineOutput::parse(&stdout)?.require_csr()?;

        let expiry = overrides
            .expiry
            .unwrap_or_else(|| Expiry::from(current.lifetime()));
        let usages = match &overrides.usages {
            Some(usages) if !usages.is_empty() => usages.clone(),
            Some(_) => Usage::LEAF_DEFAULTS.to_vec(),
            None if current.usages.is_empty() => Usage::LEAF_DEFAULTS.to_vec(),
            None => current.usages.clone(),
        };
        self.sign(request.role, &csr, issuer, expiry, &usages).await
    }
}
