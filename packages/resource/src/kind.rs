//! The three levels of the hierarchy

use std::fmt;

use certchain_signing::{CertificateRole, Expiry};
use clap::ValueEnum;

/// Object-name stem of the root CA: `root-ca.pem`, `root-ca-key.pem`
pub const ROOT_STEM: &str = "root-ca";
/// Object-name stem of the intermediate CA
pub const INTERMEDIATE_STEM: &str = "intermediate-ca";
/// Chain file written by `in` for a leaf
pub const CHAIN_FILE_NAME: &str = "ca-chain.pem";

/// Which level a resource manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ResourceKind {
    /// Self-signed root CA
    Root,
    /// Intermediate CA signed by the root
    Intermediate,
    /// Leaf certificate signed by the intermediate
    Leaf,
}

impl ResourceKind {
    /// Signing role of this level
    #[must_use]
    pub fn role(self) -> CertificateRole {
        match self {
            Self::Root => CertificateRole::Root,
            Self::Intermediate => CertificateRole::Intermediate,
            Self::Leaf => CertificateRole::Leaf,
        }
    }

    /// The level that signs this one
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Root => None,
            Self::Intermediate => Some(Self::Root),
            Self::Leaf => Some(Self::Intermediate),
        }
    }

    /// Validity used when parameters give none
    #[must_use]
    pub fn default_expiry(self) -> Expiry {
        match self {
            Self::Root => Expiry::from_hours(87_600),
            Self::Intermediate => Expiry::from_hours(43_800),
            Self::Leaf => Expiry::from_hours(8_760),
        }
    }

    /// Name used in logs and errors
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Root => "root ca",
            Self::Intermediate => "intermediate ca",
            Self::Leaf => "leaf",
        }
    }

    /// Prefix of the metadata names reported for this level
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Root => "root_ca",
            Self::Intermediate => "intermediate_ca",
            Self::Leaf => "leaf",
        }
    }

    /// Fixed object-name stem; a leaf's comes from its configuration
    #[must_use]
    pub fn fixed_stem(self) -> Option<&'static str> {
        match self {
            Self::Root => Some(ROOT_STEM),
            Self::Intermediate => Some(INTERMEDIATE_STEM),
            Self::Leaf => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_walk_up_to_the_root() {
        assert_eq!(ResourceKind::Leaf.parent(), Some(ResourceKind::Intermediate));
        assert_eq!(ResourceKind::Intermediate.parent(), Some(ResourceKind::Root));
        assert_eq!(ResourceKind::Root.parent(), None);
    }

    #[test]
    fn default_expiries() {
        assert_eq!(ResourceKind::Root.default_expiry().to_string(), "87600h");
        assert_eq!(ResourceKind::Intermediate.default_expiry().to_string(), "43800h");
        assert_eq!(ResourceKind::Leaf.default_expiry().to_string(), "8760h");
    }
}
