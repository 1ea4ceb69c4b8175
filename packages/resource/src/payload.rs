//! JSON envelopes exchanged with the orchestrator over stdin/stdout

use std::time::Duration;

use certchain_common::LoggingTransformer;
use certchain_hashing::VersionToken;
use serde::{Deserialize, Serialize};

use crate::config::{InParams, OutParams, SourceConfig};

/// A resource version: the checksum of the stored certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// SHA-256 of the stored certificate PEM
    pub checksum: VersionToken,
}

impl From<VersionToken> for Version {
    fn from(checksum: VersionToken) -> Self {
        Self { checksum }
    }
}

/// One `name`/`value` pair shown alongside a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    /// Field name
    pub name: String,
    /// Field value
    pub value: String,
}

/// `check` input
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    /// Resource configuration
    pub source: SourceConfig,
    /// Last version the orchestrator saw
    #[serde(default)]
    pub version: Option<Version>,
}

/// `in` input
#[derive(Debug, Clone, Deserialize)]
pub struct InRequest {
    /// Resource configuration
    pub source: SourceConfig,
    /// Version to fetch
    pub version: Version,
    /// Files to write
    #[serde(default)]
    pub params: InParams,
}

/// `out` input
#[derive(Debug, Clone, Deserialize)]
pub struct OutRequest {
    /// Resource configuration
    pub source: SourceConfig,
    /// Action and certificate request
    #[serde(default)]
    pub params: OutParams,
}

/// Output of `in` and `out`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    /// Version that was fetched or produced
    pub version: Version,
    /// Fields shown alongside the version
    pub metadata: Vec<MetadataField>,
}

impl VersionResponse {
    /// Value of the first metadata field called `name`
    #[must_use]
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// Accumulates response metadata in the order files are handled
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    fields: Vec<MetadataField>,
}

impl MetadataBuilder {
    /// Empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one field
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(MetadataField {
            name: name.into(),
            value: value.into(),
        });
    }

    /// `{desc}_file_name` and `{desc}_checksum`
    pub fn file(&mut self, description: &str, file_name: &str, checksum: &VersionToken) {
        self.push(format!("{description}_file_name"), file_name);
        self.push(format!("{description}_checksum"), checksum.as_str());
    }

    /// `{desc}_common_name`
    pub fn common_name(&mut self, description: &str, common_name: &str) {
        self.push(format!("{description}_common_name"), common_name);
    }

    /// `{desc}_host_{i}` per subject alternative name
    pub fn hosts(&mut self, description: &str, hosts: &[String]) {
        for (i, host) in hosts.iter().enumerate() {
            self.push(format!("{description}_host_{i}"), host.as_str());
        }
    }

    /// `{desc}_time_until_expiration`; `expired` once the validity has passed
    pub fn time_until_expiration(&mut self, description: &str, remaining: Option<Duration>) {
        let value = remaining
            .map(LoggingTransformer::format_duration)
            .unwrap_or_else(|| "expired".to_string());
        self.push(format!("{description}_time_until_expiration"), value);
    }

    /// Response carrying the accumulated fields
    #[must_use]
    pub fn finish(self, version: Version) -> VersionResponse {
        VersionResponse {
            version,
            metadata: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn check_request_without_version() {
        let request: CheckRequest =
            serde_json::from_str(r#"{"source": {"bucket_name": "pki"}}"#).unwrap();
        assert!(request.version.is_none());
    }

    #[test]
    fn in_request_reads_version_and_params() {
        let body = format!(
            r#"{{"source": {{"bucket_name": "pki", "leaf_name": "web"}},
                "version": {{"checksum": "{TOKEN}"}},
                "params": {{"save_ca_chain": true}}}}"#
        );
        let request: InRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(request.version.checksum.as_str(), TOKEN);
        assert!(request.params.save_ca_chain);
        assert!(request.params.save_certificate);
    }

    #[test]
    fn malformed_checksum_is_rejected() {
        let body = r#"{"source": {"bucket_name": "pki"}, "version": {"checksum": "abc"}}"#;
        assert!(serde_json::from_str::<InRequest>(body).is_err());
    }

    #[test]
    fn response_shape() {
        let mut metadata = MetadataBuilder::new();
        metadata.file("root_ca_certificate", "root-ca.pem", &TOKEN.parse().unwrap());
        metadata.hosts("leaf_certificate", &["a".to_string(), "b".to_string()]);
        metadata.time_until_expiration("leaf_certificate", None);
        let response = metadata.finish(Version::from(TOKEN.parse::<VersionToken>().unwrap()));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["version"]["checksum"], TOKEN);
        assert_eq!(value["metadata"][0]["name"], "root_ca_certificate_file_name");
        assert_eq!(value["metadata"][1]["value"], TOKEN);
        assert_eq!(response.metadata_value("leaf_certificate_host_1"), Some("b"));
        assert_eq!(
            response.metadata_value("leaf_certificate_time_until_expiration"),
            Some("expired")
        );
    }
}
