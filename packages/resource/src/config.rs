//! Source configuration and per-verb parameter blocks
//!
//! Unrecognised fields anywhere in the envelope are ignored, so pipelines
//! written for newer versions of the resource keep working.

use std::fmt;
use std::time::Duration;

use certchain_signing::{
    CertificateRequest, Expiry, KeySpec, RenewalOverrides, SubjectName, Usage,
};
use certchain_store::{RoleConfig, S3Config, StaticCredentials};
use log::warn;
use serde::Deserialize;

use crate::kind::{INTERMEDIATE_STEM, ResourceKind, ROOT_STEM};
use crate::{ResourceError, Result};

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_session_name() -> String {
    "certchain".to_string()
}

fn default_session_duration() -> u64 {
    certchain_store::s3::config::DEFAULT_SESSION_DURATION
}

fn default_request_timeout() -> u64 {
    certchain_store::s3::config::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

/// Where a resource's artifacts live and how to reach them
#[derive(Clone, Deserialize)]
pub struct SourceConfig {
    /// Bucket holding the artifacts
    pub bucket_name: String,
    /// Static access key; the default chain is used when absent
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret paired with `access_key_id`
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Bucket region
    #[serde(default = "default_region")]
    pub region_name: String,
    /// Role to assume before touching the bucket
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Session name for the assumed role
    #[serde(default = "default_session_name")]
    pub session_name: String,
    /// Assumed-role lease in seconds
    #[serde(default = "default_session_duration")]
    pub session_duration: u64,
    /// Key prefix shared by every object of the hierarchy
    #[serde(default)]
    pub prefix: Option<String>,
    /// Custom endpoint for S3-compatible providers
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Talk plain HTTP to `endpoint`
    #[serde(default)]
    pub disable_ssl: bool,
    /// Object-name stem of a leaf resource
    #[serde(default)]
    pub leaf_name: Option<String>,
    /// Per-operation store timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("bucket_name", &self.bucket_name)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("region_name", &self.region_name)
            .field("role_arn", &self.role_arn)
            .field("session_name", &self.session_name)
            .field("session_duration", &self.session_duration)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .field("disable_ssl", &self.disable_ssl)
            .field("leaf_name", &self.leaf_name)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SourceConfig {
    /// Minimal configuration for a bucket, every other field at its default
    #[must_use]
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            access_key_id: None,
            secret_access_key: None,
            region_name: default_region(),
            role_arn: None,
            session_name: default_session_name(),
            session_duration: default_session_duration(),
            prefix: None,
            endpoint: None,
            disable_ssl: false,
            leaf_name: None,
            request_timeout: default_request_timeout(),
        }
    }

    /// Object-name stem for `kind` under this source
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when a leaf has no usable `leaf_name`.
    pub fn stem(&self, kind: ResourceKind) -> Result<String> {
        if let Some(stem) = kind.fixed_stem() {
            return Ok(stem.to_string());
        }
        let name = self.leaf_name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(ResourceError::InvalidRequest(
                "source.leaf_name is required for a leaf resource".to_string(),
            ));
        }
        if name.contains('/') {
            return Err(ResourceError::InvalidRequest(format!(
                "source.leaf_name '{name}' must not contain '/'"
            )));
        }
        if name == ROOT_STEM || name == INTERMEDIATE_STEM {
            return Err(ResourceError::InvalidRequest(format!(
                "source.leaf_name '{name}' collides with a CA object name"
            )));
        }
        Ok(name.to_string())
    }

    /// S3 connection settings
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when only half of a static key pair is given.
    pub fn s3_config(&self) -> Result<S3Config> {
        let credentials = match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some(StaticCredentials {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(ResourceError::InvalidRequest(
                    "access_key_id and secret_access_key must be given together".to_string(),
                ));
            }
        };
        let role = self.role_arn.as_ref().map(|arn| RoleConfig {
            role_arn: arn.clone(),
            session_name: self.session_name.clone(),
            session_duration: Duration::from_secs(self.session_duration),
        });

        Ok(S3Config {
            bucket: self.bucket_name.clone(),
            region: self.region_name.clone(),
            credentials,
            role,
            endpoint: self.endpoint.clone(),
            disable_ssl: self.disable_ssl,
            request_timeout: Duration::from_secs(self.request_timeout),
        })
    }
}

/// `in` parameters: which files to materialise
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InParams {
    /// Write the resource's certificate
    #[serde(default = "default_true")]
    pub save_certificate: bool,
    /// Write the resource's private key
    pub save_private_key: bool,
    /// Leaf only
    pub save_root_ca_certificate: bool,
    /// Leaf only
    pub save_intermediate_ca_certificate: bool,
    /// Leaf only; intermediate then root
    pub save_ca_chain: bool,
    /// Leaf only; CA files go under `ca/`
    pub save_to_ca_subdir: bool,
}

impl Default for InParams {
    fn default() -> Self {
        Self {
            save_certificate: true,
            save_private_key: false,
            save_root_ca_certificate: false,
            save_intermediate_ca_certificate: false,
            save_ca_chain: false,
            save_to_ca_subdir: false,
        }
    }
}

/// What `out` does with the certificate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Issue a new key and certificate
    #[default]
    Create,
    /// Re-sign the existing key
    Renew,
}

/// `ca` block of root and intermediate `out` parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CaParams {
    /// Validity of the created or renewed CA
    #[serde(default)]
    pub expiry: Option<Expiry>,
}

/// `leaf` block of leaf `out` parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeafParams {
    /// Validity of the created or renewed leaf
    #[serde(default)]
    pub expiry: Option<Expiry>,
    /// Key usages; leaf defaults when empty
    #[serde(default)]
    pub usages: Option<Vec<Usage>>,
    /// Subject alternative names
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
}

/// `out` parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutParams {
    /// Create or renew
    #[serde(default)]
    pub action: Action,
    /// Replace an existing artifact on create
    #[serde(default)]
    pub allow_overwrite: bool,
    /// Common name of a created certificate
    #[serde(rename = "CN", default)]
    pub common_name: Option<String>,
    /// Key of a created certificate
    #[serde(default)]
    pub key: Option<KeySpec>,
    /// Root and intermediate settings
    #[serde(default)]
    pub ca: Option<CaParams>,
    /// Leaf settings
    #[serde(default)]
    pub leaf: Option<LeafParams>,
    /// At most one subject block
    #[serde(default)]
    pub names: Vec<SubjectName>,
}

impl OutParams {
    fn subject(&self) -> Result<Option<SubjectName>> {
        match self.names.as_slice() {
            [] => Ok(None),
            [subject] => Ok(Some(subject.clone())),
            more => Err(ResourceError::InvalidRequest(format!(
                "names holds {} subject blocks; only one is supported",
                more.len()
            ))),
        }
    }

    fn ca_expiry(&self) -> Option<Expiry> {
        self.ca.as_ref().and_then(|ca| ca.expiry)
    }

    fn ignore_block(&self, kind: ResourceKind) {
        let stray = match kind {
            ResourceKind::Leaf => self.ca.is_some().then_some("ca"),
            _ => self.leaf.is_some().then_some("leaf"),
        };
        if let Some(block) = stray {
            warn!("ignoring '{block}' parameters on a {kind} resource");
        }
    }

    /// Request for `action=create`, defaults filled in for `kind`
    ///
    /// # Errors
    ///
    /// `InvalidRequest` without a common name or with several subject blocks.
    pub fn certificate_request(&self, kind: ResourceKind) -> Result<CertificateRequest> {
        let common_name = self
            .common_name
            .as_deref()
            .map(str::trim)
            .filter(|cn| !cn.is_empty())
            .ok_or_else(|| {
                ResourceError::InvalidRequest("CN is required to create a certificate".to_string())
            })?;
        self.ignore_block(kind);

        let expiry = match kind {
            ResourceKind::Leaf => self.leaf.as_ref().and_then(|leaf| leaf.expiry),
            _ => self.ca_expiry(),
        }
        .unwrap_or_else(|| kind.default_expiry());

        let mut request = CertificateRequest::new(common_name, expiry);
        request.key = self.key.unwrap_or_default();
        request.subject = self.subject()?;
        if let (ResourceKind::Leaf, Some(leaf)) = (kind, &self.leaf) {
            request.usages = leaf.usages.clone().unwrap_or_default();
            request.hosts = leaf.hosts.clone().unwrap_or_default();
        }
        Ok(request)
    }

    /// Overrides for `action=renew`
    ///
    /// A root re-signs with its current validity, so a `ca.expiry` on a root
    /// is ignored with a warning.
    #[must_use]
    pub fn renewal_overrides(&self, kind: ResourceKind) -> RenewalOverrides {
        self.ignore_block(kind);
        match kind {
            ResourceKind::Root => {
                if self.ca_expiry().is_some() {
                    warn!("root renewal keeps its current validity; ignoring ca.expiry");
                }
                RenewalOverrides::default()
            }
            ResourceKind::Intermediate => RenewalOverrides {
                expiry: self.ca_expiry(),
                ..RenewalOverrides::default()
            },
            ResourceKind::Leaf => match &self.leaf {
                Some(leaf) => RenewalOverrides {
                    expiry: leaf.expiry,
                    usages: leaf.usages.clone(),
                    hosts: leaf.hosts.clone(),
                },
                None => RenewalOverrides::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_defaults() {
        let source: SourceConfig = serde_json::from_str(r#"{"bucket_name": "pki"}"#).unwrap();
        assert_eq!(source.region_name, "us-east-1");
        assert_eq!(source.session_name, "certchain");
        assert_eq!(source.session_duration, 900);
        assert_eq!(source.request_timeout, 60);
        assert!(!source.disable_ssl);

        let s3 = source.s3_config().unwrap();
        assert!(s3.credentials.is_none());
        assert!(s3.role.is_none());
    }

    #[test]
    fn role_settings_reach_the_store_config() {
        let source: SourceConfig = serde_json::from_str(
            r#"{"bucket_name": "pki", "role_arn": "arn:aws:iam::1:role/pki",
                "session_duration": 1800, "access_key_id": "AK", "secret_access_key": "SK"}"#,
        )
        .unwrap();
        let s3 = source.s3_config().unwrap();
        let role = s3.role.unwrap();
        assert_eq!(role.role_arn, "arn:aws:iam::1:role/pki");
        assert_eq!(role.session_duration, Duration::from_secs(1800));
        assert_eq!(s3.credentials.unwrap().access_key_id, "AK");
        assert!(!format!("{source:?}").contains("SK"));
    }

    #[test]
    fn half_a_key_pair_is_rejected() {
        let mut source = SourceConfig::new("pki");
        source.access_key_id = Some("AK".to_string());
        assert!(matches!(
            source.s3_config(),
            Err(ResourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn leaf_stem_comes_from_leaf_name() {
        let mut source = SourceConfig::new("pki");
        assert_eq!(source.stem(ResourceKind::Root).unwrap(), "root-ca");
        assert!(source.stem(ResourceKind::Leaf).is_err());

        source.leaf_name = Some("web".to_string());
        assert_eq!(source.stem(ResourceKind::Leaf).unwrap(), "web");

        source.leaf_name = Some("root-ca".to_string());
        assert!(source.stem(ResourceKind::Leaf).is_err());
    }

    #[test]
    fn in_params_default_to_certificate_only() {
        let params: InParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, InParams::default());
        assert!(params.save_certificate);
        assert!(!params.save_private_key);
    }

    #[test]
    fn create_request_fills_defaults() {
        let params: OutParams = serde_json::from_str(r#"{"CN": "RootCA"}"#).unwrap();
        assert_eq!(params.action, Action::Create);
        let request = params.certificate_request(ResourceKind::Root).unwrap();
        assert_eq!(request.common_name, "RootCA");
        assert_eq!(request.key, KeySpec::rsa(2048));
        assert_eq!(request.expiry, Expiry::from_hours(87_600));
        assert!(request.subject.is_none());
    }

    #[test]
    fn partial_key_block_keeps_the_other_default() {
        let params: OutParams =
            serde_json::from_str(r#"{"CN": "RootCA", "key": {"size": 4096}}"#).unwrap();
        let request = params.certificate_request(ResourceKind::Root).unwrap();
        assert_eq!(request.key, KeySpec::rsa(4096));
        assert!(request.validate().is_ok());

        let params: OutParams =
            serde_json::from_str(r#"{"CN": "RootCA", "key": {"algo": "rsa"}}"#).unwrap();
        let request = params.certificate_request(ResourceKind::Root).unwrap();
        assert_eq!(request.key, KeySpec::rsa(2048));
    }

    #[test]
    fn leaf_block_feeds_leaf_requests_only() {
        let params: OutParams = serde_json::from_str(
            r#"{"CN": "web", "leaf": {"expiry": "720h", "usages": ["server auth"],
                "hosts": ["web.internal"]}}"#,
        )
        .unwrap();
        let leaf = params.certificate_request(ResourceKind::Leaf).unwrap();
        assert_eq!(leaf.expiry, Expiry::from_hours(720));
        assert_eq!(leaf.usages, vec![Usage::ServerAuth]);
        assert_eq!(leaf.hosts, vec!["web.internal"]);

        let ca = params.certificate_request(ResourceKind::Intermediate).unwrap();
        assert_eq!(ca.expiry, Expiry::from_hours(43_800));
        assert!(ca.hosts.is_empty());
    }

    #[test]
    fn several_subject_blocks_are_rejected() {
        let params: OutParams =
            serde_json::from_str(r#"{"CN": "RootCA", "names": [{"C": "US"}, {"C": "DE"}]}"#)
                .unwrap();
        assert!(matches!(
            params.certificate_request(ResourceKind::Root),
            Err(ResourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn missing_common_name_is_rejected() {
        let params = OutParams::default();
        assert!(matches!(
            params.certificate_request(ResourceKind::Root),
            Err(ResourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn renewal_overrides_follow_the_kind() {
        let params: OutParams = serde_json::from_str(
            r#"{"action": "renew", "ca": {"expiry": "100h"}, "leaf": {"hosts": ["a"]}}"#,
        )
        .unwrap();
        assert_eq!(params.action, Action::Renew);
        assert_eq!(
            params.renewal_overrides(ResourceKind::Root),
            RenewalOverrides::default()
        );
        assert_eq!(
            params.renewal_overrides(ResourceKind::Intermediate).expiry,
            Some(Expiry::from_hours(100))
        );
        let leaf = params.renewal_overrides(ResourceKind::Leaf);
        assert_eq!(leaf.expiry, None);
        assert_eq!(leaf.hosts, Some(vec!["a".to_string()]));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let params: OutParams = serde_json::from_str(
            r#"{"CN": "RootCA", "colour": "blue", "ca": {"expiry": "1h", "flavour": 1}}"#,
        )
        .unwrap();
        assert_eq!(params.common_name.as_deref(), Some("RootCA"));
        let source: SourceConfig =
            serde_json::from_str(r#"{"bucket_name": "pki", "unexpected": true}"#).unwrap();
        assert_eq!(source.bucket_name, "pki");
    }
}
