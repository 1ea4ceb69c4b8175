//! Declarative certificate requests

use std::fmt;

use certchain_common::CertificateArtifact;
use serde::{Deserialize, Serialize};

use crate::engine::{CertificateRole, IssuerMaterial};
use crate::expiry::Expiry;
use crate::{Result, SigningError};

/// Public key algorithm of a generated key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// RSA
    Rsa,
    /// ECDSA over a NIST curve
    Ecdsa,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rsa => "rsa",
            Self::Ecdsa => "ecdsa",
        })
    }
}

/// Algorithm and size of a generated key
///
/// Each field defaults on its own (`rsa`, `2048`), so a block naming only
/// one of them is completed from the default spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySpec {
    /// Key algorithm
    pub algo: KeyAlgorithm,
    /// Modulus bits for RSA, curve bits for ECDSA
    pub size: u32,
}

impl KeySpec {
    /// Accepted RSA modulus sizes
    pub const RSA_SIZES: [u32; 2] = [2048, 4096];
    /// Accepted ECDSA curve sizes
    pub const ECDSA_SIZES: [u32; 3] = [256, 384, 521];

    /// RSA key of `size` bits
    #[must_use]
    pub const fn rsa(size: u32) -> Self {
        Self {
            algo: KeyAlgorithm::Rsa,
            size,
        }
    }

    /// ECDSA key on the `size`-bit curve
    #[must_use]
    pub const fn ecdsa(size: u32) -> Self {
        Self {
            algo: KeyAlgorithm::Ecdsa,
            size,
        }
    }

    /// # Errors
    ///
    /// Returns `SigningError::InvalidRequest` for a size the algorithm does
    /// not support.
    pub fn validate(&self) -> Result<()> {
        let allowed: &[u32] = match self.algo {
            KeyAlgorithm::Rsa => &Self::RSA_SIZES,
            KeyAlgorithm::Ecdsa => &Self::ECDSA_SIZES,
        };
        if allowed.contains(&self.size) {
            Ok(())
        } else {
            Err(SigningError::InvalidRequest(format!(
                "unsupported key spec {self}, {} accepts sizes {allowed:?}",
                self.algo
            )))
        }
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::rsa(2048)
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algo, self.size)
    }
}

/// One subject block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectName {
    /// `C`
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// `L`
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    /// `O`
    #[serde(rename = "O", default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// `OU`
    #[serde(rename = "OU", default, skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    /// `ST`
    #[serde(rename = "ST", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl SubjectName {
    /// Whether no attribute is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.country,
            &self.locality,
            &self.organization,
            &self.organizational_unit,
            &self.state,
        ]
        .iter()
        .all(|field| field.is_none())
    }
}

/// Key usage and extended key usage names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Usage {
    /// Generic signing
    #[serde(rename = "signing")]
    Signing,
    /// Digital signature
    #[serde(rename = "digital signature")]
    DigitalSignature,
    /// Non-repudiation
    #[serde(rename = "content commitment")]
    ContentCommitment,
    /// Key encipherment
    #[serde(rename = "key encipherment")]
    KeyEncipherment,
    /// Key agreement
    #[serde(rename = "key agreement")]
    KeyAgreement,
    /// Data encipherment
    #[serde(rename = "data encipherment")]
    DataEncipherment,
    /// Certificate signing
    #[serde(rename = "cert sign")]
    CertSign,
    /// CRL signing
    #[serde(rename = "crl sign")]
    CrlSign,
    /// Encipher only
    #[serde(rename = "encipher only")]
    EncipherOnly,
    /// Decipher only
    #[serde(rename = "decipher only")]
    DecipherOnly,
    /// Any extended usage
    #[serde(rename = "any")]
    Any,
    /// TLS server
    #[serde(rename = "server auth")]
    ServerAuth,
    /// TLS client
    #[serde(rename = "client auth")]
    ClientAuth,
    /// Code signing
    #[serde(rename = "code signing")]
    CodeSigning,
    /// Email protection
    #[serde(rename = "email protection")]
    EmailProtection,
    /// S/MIME
    #[serde(rename = "s/mime")]
    Smime,
    /// IPsec end system
    #[serde(rename = "ipsec end system")]
    IpsecEndSystem,
    /// IPsec tunnel
    #[serde(rename = "ipsec tunnel")]
    IpsecTunnel,
    /// IPsec user
    #[serde(rename = "ipsec user")]
    IpsecUser,
    /// Timestamping
    #[serde(rename = "timestamping")]
    Timestamping,
    /// OCSP signing
    #[serde(rename = "ocsp signing")]
    OcspSigning,
}

impl Usage {
    /// Usages applied to a leaf when the request names none
    pub const LEAF_DEFAULTS: [Usage; 4] = [
        Usage::Signing,
        Usage::KeyEncipherment,
        Usage::ServerAuth,
        Usage::ClientAuth,
    ];

    /// Usages every CA certificate carries
    pub const CA: [Usage; 3] = [Usage::CertSign, Usage::CrlSign, Usage::DigitalSignature];

    /// Name as written in requests and engine profiles
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signing => "signing",
            Self::DigitalSignature => "digital signature",
            Self::ContentCommitment => "content commitment",
            Self::KeyEncipherment => "key encipherment",
            Self::KeyAgreement => "key agreement",
            Self::DataEncipherment => "data encipherment",
            Self::CertSign => "cert sign",
            Self::CrlSign => "crl sign",
            Self::EncipherOnly => "encipher only",
            Self::DecipherOnly => "decipher only",
            Self::Any => "any",
            Self::ServerAuth => "server auth",
            Self::ClientAuth => "client auth",
            Self::CodeSigning => "code signing",
            Self::EmailProtection => "email protection",
            Self::Smime => "s/mime",
            Self::IpsecEndSystem => "ipsec end system",
            Self::IpsecTunnel => "ipsec tunnel",
            Self::IpsecUser => "ipsec user",
            Self::Timestamping => "timestamping",
            Self::OcspSigning => "ocsp signing",
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a create operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Subject common name
    pub common_name: String,
    /// Key to generate
    pub key: KeySpec,
    /// Validity period
    pub expiry: Expiry,
    /// Optional subject attributes
    pub subject: Option<SubjectName>,
    /// Leaf only
    pub usages: Vec<Usage>,
    /// Leaf only; DNS names or IP addresses
    pub hosts: Vec<String>,
}

impl CertificateRequest {
    /// Request with the default key and no subject
    #[must_use]
    pub fn new(common_name: impl Into<String>, expiry: Expiry) -> Self {
        Self {
            common_name: common_name.into(),
            key: KeySpec::default(),
            expiry,
            subject: None,
            usages: Vec::new(),
            hosts: Vec::new(),
        }
    }

    /// Usages to embed, falling back to the leaf defaults
    #[must_use]
    pub fn effective_usages(&self) -> Vec<Usage> {
        if self.usages.is_empty() {
            Usage::LEAF_DEFAULTS.to_vec()
        } else {
            self.usages.clone()
        }
    }

    /// # Errors
    ///
    /// Returns `SigningError::InvalidRequest` for an empty common name, an
    /// unsupported key spec or a blank host.
    pub fn validate(&self) -> Result<()> {
        if self.common_name.trim().is_empty() {
            return Err(SigningError::InvalidRequest(
                "common name must not be empty".to_string(),
            ));
        }
        self.key.validate()?;
        if self.hosts.iter().any(|host| host.trim().is_empty()) {
            return Err(SigningError::InvalidRequest(
                "hosts must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional changes applied while re-signing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenewalOverrides {
    /// Intermediate and leaf
    pub expiry: Option<Expiry>,
    /// Leaf only
    pub usages: Option<Vec<Usage>>,
    /// Leaf only
    pub hosts: Option<Vec<String>>,
}

/// Input to a renew operation
///
/// The existing key is reused; only the certificate changes.
#[derive(Debug, Clone)]
pub struct RenewalRequest {
    /// Role of the certificate being renewed
    pub role: CertificateRole,
    /// Certificate to renew
    pub certificate: CertificateArtifact,
    /// Its private key, reused as is
    pub key: CertificateArtifact,
    /// Issuing CA; `None` for a self-signed root
    pub issuer: Option<IssuerMaterial>,
    /// Changes applied on renewal
    pub overrides: RenewalOverrides,
}

impl RenewalRequest {
    /// # Errors
    ///
    /// Returns `SigningError::InvalidRequest` when the issuer does not match
    /// the role or an override is not allowed for it.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(SigningError::InvalidRequest(reason));
        match (self.role, self.issuer.is_some()) {
            (CertificateRole::Root, true) => {
                return invalid("a root renews self-signed, without an issuer".to_string());
            }
            (CertificateRole::Intermediate | CertificateRole::Leaf, false) => {
                return invalid(format!("renewing a {} requires its issuer", self.role));
            }
            _ => {}
        }
        let o = &self.overrides;
        if self.role == CertificateRole::Root && o.expiry.is_some() {
            return invalid("root renewal accepts no expiry override".to_string());
        }
        if self.role != CertificateRole::Leaf && (o.usages.is_some() || o.hosts.is_some()) {
            return invalid(format!(
                "usages and hosts overrides apply to leaf certificates, not a {}",
                self.role
            ));
        }
        if let Some(hosts) = &o.hosts {
            if hosts.iter().any(|host| host.trim().is_empty()) {
                return invalid("hosts must not contain empty entries".to_string());
            }
        }
        Ok(())
    }
}
