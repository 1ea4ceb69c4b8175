//! cfssl request and signing-profile documents

use serde::Serialize;
use serde_json::{Value, json};

use crate::engine::CertificateRole;
use crate::expiry::Expiry;
use crate::request::{KeySpec, SubjectName, Usage};

#[derive(Debug, Serialize)]
pub(crate) struct CaSection {
    pub expiry: String,
    pub pathlen: u8,
    pub pathlenzero: bool,
}

/// CSR description read by `gencert`, `genkey` and `gencsr`
#[derive(Debug, Serialize)]
pub(crate) struct CsrDocument<'a> {
    #[serde(rename = "CN")]
    pub common_name: &'a str,
    pub key: KeySpec,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<&'a SubjectName>,
    #[serde(skip_serializing_if = "no_hosts")]
    pub hosts: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<CaSection>,
}

fn no_hosts(hosts: &&[String]) -> bool {
    hosts.is_empty()
}

impl<'a> CsrDocument<'a> {
    pub fn new(common_name: &'a str, key: KeySpec, subject: Option<&'a SubjectName>) -> Self {
        Self {
            common_name,
            key,
            names: subject.filter(|s| !s.is_empty()).into_iter().collect(),
            hosts: &[],
            ca: None,
        }
    }

    /// Self-signed CA section for a root
    #[must_use]
    pub fn with_ca(mut self, expiry: Expiry, pathlen: u8) -> Self {
        self.ca = Some(CaSection {
            expiry: expiry.to_string(),
            pathlen,
            pathlenzero: pathlen == 0,
        });
        self
    }

    #[must_use]
    pub fn with_hosts(mut self, hosts: &'a [String]) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Profile name used for a role in the signing config
pub(crate) fn profile_name(role: CertificateRole) -> &'static str {
    match role {
        CertificateRole::Root => "root",
        CertificateRole::Intermediate => "intermediate",
        CertificateRole::Leaf => "leaf",
    }
}

/// Signing config with a single profile for `role`
pub(crate) fn signing_config(role: CertificateRole, expiry: Expiry, usages: &[Usage]) -> Value {
    let usages: Vec<&str> = match role.path_len() {
        Some(_) => Usage::CA.iter().map(|u| u.as_str()).collect(),
        None => usages.iter().map(|u| u.as_str()).collect(),
    };
    let mut profile = json!({
        "expiry": expiry.to_string(),
        "usages": usages,
    });
    if let Some(path_len) = role.path_len() {
        profile["ca_constraint"] = json!({
            "is_ca": true,
            "max_path_len": path_len,
            "max_path_len_zero": path_len == 0,
        });
    }

    json!({
        "signing": {
            "default": { "expiry": expiry.to_string() },
            "profiles": { profile_name(role): profile },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_document_shape() {
        let subject = SubjectName {
            country: Some("US".to_string()),
            ..SubjectName::default()
        };
        let hosts = vec!["web.internal".to_string()];
        let doc = CsrDocument::new("web", KeySpec::ecdsa(256), Some(&subject)).with_hosts(&hosts);
        let value: Value = serde_json::from_slice(&doc.to_bytes().unwrap()).unwrap();

        assert_eq!(value["CN"], "web");
        assert_eq!(value["key"], json!({"algo": "ecdsa", "size": 256}));
        assert_eq!(value["names"], json!([{"C": "US"}]));
        assert_eq!(value["hosts"], json!(["web.internal"]));
        assert!(value.get("ca").is_none());
    }

    #[test]
    fn root_document_carries_ca_section() {
        let doc = CsrDocument::new("RootCA", KeySpec::default(), None)
            .with_ca(Expiry::from_hours(87_600), 1);
        let value: Value = serde_json::from_slice(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(
            value["ca"],
            json!({"expiry": "87600h", "pathlen": 1, "pathlenzero": false})
        );
        assert!(value.get("names").is_none());
        assert!(value.get("hosts").is_none());
    }

    #[test]
    fn intermediate_profile_is_a_path_len_zero_ca() {
        let config = signing_config(CertificateRole::Intermediate, Expiry::from_hours(43_800), &[]);
        let profile = &config["signing"]["profiles"]["intermediate"];
        assert_eq!(profile["expiry"], "43800h");
        assert_eq!(profile["ca_constraint"]["max_path_len"], 0);
        assert_eq!(profile["ca_constraint"]["max_path_len_zero"], true);
        assert_eq!(profile["usages"], json!(["cert sign", "crl sign", "digital signature"]));
    }

    #[test]
    fn leaf_profile_uses_requested_usages() {
        let config = signing_config(
            CertificateRole::Leaf,
            Expiry::from_hours(8_760),
            &Usage::LEAF_DEFAULTS,
        );
        let profile = &config["signing"]["profiles"]["leaf"];
        assert_eq!(
            profile["usages"],
            json!(["signing", "key encipherment", "server auth", "client auth"])
        );
        assert!(profile.get("ca_constraint").is_none());
    }
}
