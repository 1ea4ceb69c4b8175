//! Certificate inspection

use std::net::IpAddr;
use std::time::Duration;

use certchain_common::CertificateArtifact;
use ::time::OffsetDateTime;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::request::{SubjectName, Usage};
use crate::{Result, SigningError};

/// Facts read from a PEM certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject common name
    pub common_name: String,
    /// Remaining subject attributes
    pub subject: SubjectName,
    /// Issuer common name
    pub issuer_common_name: String,
    /// Serial number as hex
    pub serial: String,
    /// Start of validity
    pub not_before: OffsetDateTime,
    /// End of validity
    pub not_after: OffsetDateTime,
    /// Subject alternative names: DNS names and IP addresses
    pub hosts: Vec<String>,
    /// Basic constraints CA flag
    pub is_ca: bool,
    /// Basic constraints path length
    pub path_len: Option<u32>,
    /// Key usages followed by extended key usages
    pub usages: Vec<Usage>,
    /// `rsa` or `ecdsa`
    pub key_algorithm: String,
    /// Key size in bits; curve size for ECDSA
    pub key_bits: usize,
}

fn first_der(pem_text: &[u8]) -> Result<Vec<u8>> {
    let block = ::pem::parse(pem_text).map_err(|e| SigningError::Inspect(e.to_string()))?;
    if block.tag() != "CERTIFICATE" {
        return Err(SigningError::Inspect(format!(
            "expected a CERTIFICATE block, found {}",
            block.tag()
        )));
    }
    Ok(block.into_contents())
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn first_value<'a, 'b: 'a>(
    mut values: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Option<String> {
    values
        .next()
        .and_then(|value| value.as_str().ok())
        .map(str::to_string)
}

fn subject_fields(name: &X509Name<'_>) -> SubjectName {
    SubjectName {
        country: first_value(name.iter_country()),
        locality: first_value(name.iter_locality()),
        organization: first_value(name.iter_organization()),
        organizational_unit: first_value(name.iter_organizational_unit()),
        state: first_value(name.iter_state_or_province()),
    }
}

fn usages_of(cert: &X509Certificate<'_>) -> Result<Vec<Usage>> {
    let mut usages = Vec::new();
    if let Some(ku) = cert
        .key_usage()
        .map_err(|e| SigningError::Inspect(format!("invalid key usage: {e}")))?
    {
        let ku = ku.value;
        let flags = [
            (ku.digital_signature(), Usage::DigitalSignature),
            (ku.non_repudiation(), Usage::ContentCommitment),
            (ku.key_encipherment(), Usage::KeyEncipherment),
            (ku.data_encipherment(), Usage::DataEncipherment),
            (ku.key_agreement(), Usage::KeyAgreement),
            (ku.key_cert_sign(), Usage::CertSign),
            (ku.crl_sign(), Usage::CrlSign),
            (ku.encipher_only(), Usage::EncipherOnly),
            (ku.decipher_only(), Usage::DecipherOnly),
        ];
        usages.extend(flags.into_iter().filter(|(set, _)| *set).map(|(_, usage)| usage));
    }
    if let Some(eku) = cert
        .extended_key_usage()
        .map_err(|e| SigningError::Inspect(format!("invalid extended key usage: {e}")))?
    {
        let eku = eku.value;
        let flags = [
            (eku.any, Usage::Any),
            (eku.server_auth, Usage::ServerAuth),
            (eku.client_auth, Usage::ClientAuth),
            (eku.code_signing, Usage::CodeSigning),
            (eku.email_protection, Usage::EmailProtection),
            (eku.time_stamping, Usage::Timestamping),
            (eku.ocsp_signing, Usage::OcspSigning),
        ];
        usages.extend(flags.into_iter().filter(|(set, _)| *set).map(|(_, usage)| usage));
    }
    Ok(usages)
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}

impl CertificateInfo {
    /// Inspect the first certificate of a PEM document
    ///
    /// # Errors
    ///
    /// Returns `SigningError::Inspect` if the document is not a parseable
    /// X.509 certificate.
    pub fn from_pem(pem_text: &[u8]) -> Result<Self> {
        let der = first_der(pem_text)?;
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| SigningError::Inspect(format!("failed to parse certificate: {e}")))?;

        let hosts = match cert.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_string()),
                    GeneralName::IPAddress(bytes) => {
                        ip_from_bytes(bytes).map(|ip| ip.to_string())
                    }
                    _ => None,
                })
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => return Err(SigningError::Inspect(format!("invalid SAN extension: {e}"))),
        };

        let (is_ca, path_len) = match cert.basic_constraints() {
            Ok(Some(bc)) => (bc.value.ca, bc.value.path_len_constraint),
            Ok(None) => (false, None),
            Err(e) => {
                return Err(SigningError::Inspect(format!(
                    "invalid basic constraints: {e}"
                )));
            }
        };

        let (key_algorithm, key_bits) = match cert.public_key().parsed() {
            Ok(PublicKey::RSA(rsa)) => ("rsa".to_string(), rsa.key_size()),
            Ok(PublicKey::EC(ec)) => ("ecdsa".to_string(), ec.key_size()),
            Ok(_) => ("unknown".to_string(), 0),
            Err(e) => return Err(SigningError::Inspect(format!("invalid public key: {e}"))),
        };

        Ok(Self {
            common_name: common_name(cert.subject()),
            subject: subject_fields(cert.subject()),
            issuer_common_name: common_name(cert.issuer()),
            serial: cert.raw_serial_as_string(),
            not_before: cert.validity().not_before.to_datetime(),
            not_after: cert.validity().not_after.to_datetime(),
            hosts,
            is_ca,
            path_len,
            usages: usages_of(&cert)?,
            key_algorithm,
            key_bits,
        })
    }

    /// # Errors
    ///
    /// See [`from_pem`](Self::from_pem).
    pub fn from_artifact(artifact: &CertificateArtifact) -> Result<Self> {
        Self::from_pem(artifact.as_bytes())
    }

    /// Remaining validity, `None` once expired
    #[must_use]
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let remaining = self.not_after - OffsetDateTime::now_utc();
        if remaining.is_positive() {
            Duration::try_from(remaining).ok()
        } else {
            None
        }
    }

    /// Length of the validity window
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        Duration::try_from(self.not_after - self.not_before).unwrap_or_default()
    }
}

/// Check that `certificate` carries a valid signature by `issuer`'s key
///
/// Pass the same artifact twice to check a self-signed certificate.
///
/// # Errors
///
/// Returns `SigningError::Inspect` if either document does not parse or the
/// signature does not verify.
pub fn verify_issued_by(certificate: &CertificateArtifact, issuer: &CertificateArtifact) -> Result<()> {
    let cert_der = first_der(certificate.as_bytes())?;
    let issuer_der = first_der(issuer.as_bytes())?;
    let (_, cert) = X509Certificate::from_der(&cert_der)
        .map_err(|e| SigningError::Inspect(format!("failed to parse certificate: {e}")))?;
    let (_, issuer_cert) = X509Certificate::from_der(&issuer_der)
        .map_err(|e| SigningError::Inspect(format!("failed to parse issuer: {e}")))?;

    cert.verify_signature(Some(issuer_cert.public_key()))
        .map_err(|e| SigningError::Inspect(format!("signature does not verify: {e}")))
}
