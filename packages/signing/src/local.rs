//! In-process signing engine built on rcgen
//!
//! Issues the same hierarchy as the cfssl engine without an external binary.
//! RSA keys are generated with the `rsa` crate and handed to rcgen as PKCS#8;
//! ECDSA keys come from rcgen directly. P-521 is not available here.

use async_trait::async_trait;
use certchain_common::{ArtifactKind, CertificateArtifact};
use log::{debug, info};
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName,
    DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SerialNumber,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::engine::{CertificateRole, IssuedCertificate, IssuerMaterial, SigningEngine};
use crate::expiry::Expiry;
use crate::inspect::CertificateInfo;
use crate::request::{CertificateRequest, KeyAlgorithm, KeySpec, RenewalRequest, SubjectName, Usage};
use crate::{Result, SigningError};

const ENGINE: &str = "local";

/// Signing engine that never leaves the process
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEngine;

impl LocalEngine {
    /// In-process engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Generate a key pair and its PEM encoding
fn generate_key(spec: KeySpec) -> Result<(KeyPair, Zeroizing<String>)> {
    spec.validate()?;
    match (spec.algo, spec.size) {
        (KeyAlgorithm::Rsa, bits) => {
            let private = rsa::RsaPrivateKey::new(&mut rsa::rand_core::OsRng, bits as usize)
                .map_err(|e| SigningError::Engine {
                    engine: ENGINE,
                    diagnostic: format!("RSA key generation failed: {e}"),
                })?;
            let pem = private
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| SigningError::Engine {
                    engine: ENGINE,
                    diagnostic: format!("RSA key encoding failed: {e}"),
                })?;
            let key_pair = KeyPair::from_pem(&pem)?;
            Ok((key_pair, pem))
        }
        (KeyAlgorithm::Ecdsa, 256) => {
            from_generated(KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?)
        }
        (KeyAlgorithm::Ecdsa, 384) => {
            from_generated(KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384)?)
        }
        (KeyAlgorithm::Ecdsa, _) => Err(SigningError::Unsupported {
            engine: ENGINE,
            what: format!("key spec {spec}"),
        }),
    }
}

fn from_generated(key_pair: KeyPair) -> Result<(KeyPair, Zeroizing<String>)> {
    let pem = Zeroizing::new(key_pair.serialize_pem());
    Ok((key_pair, pem))
}

fn load_key(artifact: &CertificateArtifact) -> Result<KeyPair> {
    KeyPair::from_pem(artifact.as_str()).map_err(|e| SigningError::Engine {
        engine: ENGINE,
        diagnostic: format!("cannot load private key (PKCS#8 expected): {e}"),
    })
}

fn issuer_from(material: &IssuerMaterial) -> Result<Issuer<'static, KeyPair>> {
    let key = load_key(&material.key)?;
    Issuer::from_ca_cert_pem(material.certificate.as_str(), key).map_err(|e| {
        SigningError::Engine {
            engine: ENGINE,
            diagnostic: format!("invalid issuer certificate: {e}"),
        }
    })
}

fn random_serial() -> SerialNumber {
    let mut bytes: [u8; 16] = rand::random();
    // Positive, non-zero leading byte
    bytes[0] = (bytes[0] & 0x7f) | 0x01;
    SerialNumber::from_slice(&bytes)
}

fn validity(expiry: Expiry) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let now = OffsetDateTime::now_utc();
    let not_after = time::Duration::try_from(expiry.as_duration())
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .ok_or_else(|| SigningError::InvalidRequest(format!("expiry {expiry} is out of range")))?;
    Ok((now, not_after))
}

fn distinguished_name(common_name: &str, subject: Option<&SubjectName>) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    if let Some(subject) = subject {
        let fields = [
            (DnType::CountryName, &subject.country),
            (DnType::StateOrProvinceName, &subject.state),
            (DnType::LocalityName, &subject.locality),
            (DnType::OrganizationName, &subject.organization),
            (DnType::OrganizationalUnitName, &subject.organizational_unit),
        ];
        for (ty, value) in fields {
            if let Some(value) = value {
                dn.push(ty, value.as_str());
            }
        }
    }
    dn.push(DnType::CommonName, common_name);
    dn
}

fn apply_usages(params: &mut CertificateParams, usages: &[Usage]) {
    params.key_usages.clear();
    params.extended_key_usages.clear();
    for usage in usages {
        match usage {
            Usage::Signing | Usage::DigitalSignature => {
                params.key_usages.push(KeyUsagePurpose::DigitalSignature);
            }
            Usage::ContentCommitment => params.key_usages.push(KeyUsagePurpose::ContentCommitment),
            Usage::KeyEncipherment => params.key_usages.push(KeyUsagePurpose::KeyEncipherment),
            Usage::KeyAgreement => params.key_usages.push(KeyUsagePurpose::KeyAgreement),
            Usage::DataEncipherment => params.key_usages.push(KeyUsagePurpose::DataEncipherment),
            Usage::CertSign => params.key_usages.push(KeyUsagePurpose::KeyCertSign),
            Usage::CrlSign => params.key_usages.push(KeyUsagePurpose::CrlSign),
            Usage::EncipherOnly => params.key_usages.push(KeyUsagePurpose::EncipherOnly),
            Usage::DecipherOnly => params.key_usages.push(KeyUsagePurpose::DecipherOnly),
            Usage::Any => params.extended_key_usages.push(ExtendedKeyUsagePurpose::Any),
            Usage::ServerAuth => params.extended_key_usages.push(ExtendedKeyUsagePurpose::ServerAuth),
            Usage::ClientAuth => params.extended_key_usages.push(ExtendedKeyUsagePurpose::ClientAuth),
            Usage::CodeSigning => params.extended_key_usages.push(ExtendedKeyUsagePurpose::CodeSigning),
            Usage::EmailProtection | Usage::Smime => {
                params.extended_key_usages.push(ExtendedKeyUsagePurpose::EmailProtection);
            }
            // id-kp-ipsecEndSystem, id-kp-ipsecTunnel, id-kp-ipsecUser
            Usage::IpsecEndSystem => params
                .extended_key_usages
                .push(ExtendedKeyUsagePurpose::Other(vec![1, 3, 6, 1, 5, 5, 7, 3, 5])),
            Usage::IpsecTunnel => params
                .extended_key_usages
                .push(ExtendedKeyUsagePurpose::Other(vec![1, 3, 6, 1, 5, 5, 7, 3, 6])),
            Usage::IpsecUser => params
                .extended_key_usages
                .push(ExtendedKeyUsagePurpose::Other(vec![1, 3, 6, 1, 5, 5, 7, 3, 7])),
            Usage::Timestamping => params.extended_key_usages.push(ExtendedKeyUsagePurpose::TimeStamping),
            Usage::OcspSigning => params.extended_key_usages.push(ExtendedKeyUsagePurpose::OcspSigning),
        }
    }
    unique(&mut params.key_usages);
    unique(&mut params.extended_key_usages);
}

fn unique<T: PartialEq>(items: &mut Vec<T>) {
    let mut kept = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    *items = kept;
}

/// Role-specific constraints, usages, validity and a fresh serial
fn shape_params(
    params: &mut CertificateParams,
    role: CertificateRole,
    usages: &[Usage],
    expiry: Expiry,
) -> Result<()> {
    match role.path_len() {
        Some(path_len) => {
            params.is_ca = IsCa::Ca(BasicConstraints::Constrained(path_len));
            apply_usages(params, &Usage::CA);
        }
        None => {
            params.is_ca = IsCa::NoCa;
            apply_usages(params, usages);
        }
    }
    let (not_before, not_after) = validity(expiry)?;
    params.not_before = not_before;
    params.not_after = not_after;
    params.serial_number = Some(random_serial());
    params.use_authority_key_identifier_extension = role != CertificateRole::Root;
    Ok(())
}

fn certificate_artifact(pem: String) -> Result<CertificateArtifact> {
    Ok(CertificateArtifact::from_pem(ArtifactKind::Certificate, pem)?)
}

fn key_artifact(pem: &Zeroizing<String>) -> Result<CertificateArtifact> {
    Ok(CertificateArtifact::from_pem(
        ArtifactKind::PrivateKey,
        pem.as_bytes().to_vec(),
    )?)
}

impl LocalEngine {
    /// Generate a key and CSR, then sign the CSR with `issuer`
    fn create_child(
        &self,
        role: CertificateRole,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate> {
        request.validate()?;
        let (key_pair, key_pem) = generate_key(request.key)?;

        let hosts = if role == CertificateRole::Leaf {
            request.hosts.clone()
        } else {
            Vec::new()
        };
        let mut params = CertificateParams::new(hosts)?;
        params.distinguished_name =
            distinguished_name(&request.common_name, request.subject.as_ref());

        let csr_pem = params.serialize_request(&key_pair)?.pem()?;
        debug!("{ENGINE}: generated CSR for {}", request.common_name);

        let mut csr = CertificateSigningRequestParams::from_pem(&csr_pem)?;
        csr.params = params;
        shape_params(&mut csr.params, role, &request.effective_usages(), request.expiry)?;

        let signer = issuer_from(issuer)?;
        let cert = csr.signed_by(&signer)?;

        Ok(IssuedCertificate {
            certificate: certificate_artifact(cert.pem())?,
            key: key_artifact(&key_pem)?,
            csr: Some(CertificateArtifact::from_pem(
                ArtifactKind::CertificateRequest,
                csr_pem,
            )?),
        })
    }
}

#[async_trait]
impl SigningEngine for LocalEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn create_root(&self, request: &CertificateRequest) -> Result<IssuedCertificate> {
        request.validate()?;
        let (key_pair, key_pem) = generate_key(request.key)?;

        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.distinguished_name =
            distinguished_name(&request.common_name, request.subject.as_ref());
        shape_params(&mut params, CertificateRole::Root, &[], request.expiry)?;

        let cert = params.self_signed(&key_pair)?;
        info!("{ENGINE}: issued self-signed root {}", request.common_name);

        Ok(IssuedCertificate {
            certificate: certificate_artifact(cert.pem())?,
            key: key_artifact(&key_pem)?,
            csr: None,
        })
    }

    async fn create_intermediate(
        &self,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate> {
        self.create_child(CertificateRole::Intermediate, request, issuer)
    }

    async fn create_leaf(
        &self,
        request: &CertificateRequest,
        issuer: &IssuerMaterial,
    ) -> Result<IssuedCertificate> {
        self.create_child(CertificateRole::Leaf, request, issuer)
    }

    async fn renew(&self, request: &RenewalRequest) -> Result<CertificateArtifact> {
        request.validate()?;
        let current = CertificateInfo::from_artifact(&request.certificate)?;
        let key_pair = load_key(&request.key)?;
        let overrides = &request.overrides;

        // Subject, SANs and usages come from the certificate being renewed
        let hosts = match (request.role, &overrides.hosts) {
            (CertificateRole::Leaf, Some(hosts)) => hosts.clone(),
            (CertificateRole::Leaf, None) => current.hosts.clone(),
            _ => Vec::new(),
        };
        let mut params = CertificateParams::new(hosts)?;
        params.distinguished_name =
            distinguished_name(&current.common_name, Some(&current.subject));

        let expiry = overrides
            .expiry
            .unwrap_or_else(|| Expiry::from(current.lifetime()));
        let usages = match &overrides.usages {
            Some(usages) if !usages.is_empty() => usages.clone(),
            Some(_) => Usage::LEAF_DEFAULTS.to_vec(),
            None if current.usages.is_empty() => Usage::LEAF_DEFAULTS.to_vec(),
            None => current.usages.clone(),
        };
        shape_params(&mut params, request.role, &usages, expiry)?;

        let cert = match &request.issuer {
            None => params.self_signed(&key_pair)?,
            Some(issuer) => params.signed_by(&key_pair, &issuer_from(issuer)?)?,
        };
        debug!("{ENGINE}: re-signed {} {}", request.role, current.common_name);
        certificate_artifact(cert.pem())
    }
}
