//! SHA-256 version tokens

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{HashError, Result};

const TOKEN_LEN: usize = 64;

/// Hex-encoded SHA-256 of an artifact's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionToken(String);

impl VersionToken {
    /// Parse a token received from outside (orchestrator input, object metadata)
    ///
    /// Upper-case hex is accepted and normalised.
    ///
    /// # Errors
    ///
    /// Returns `HashError::InvalidToken` unless the input is 64 hex characters.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.len() != TOKEN_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HashError::InvalidToken(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// The token as lowercase hex
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compute the version token of `bytes`
#[must_use]
pub fn hash(bytes: &[u8]) -> VersionToken {
    VersionToken(hex::encode(Sha256::digest(bytes)))
}

/// Check `bytes` against a recorded checksum
///
/// # Errors
///
/// Returns `HashError::InvalidToken` if `expected` is malformed and
/// `HashError::ChecksumMismatch` if the bytes hash to something else.
pub fn verify(bytes: &[u8], expected: &str) -> Result<VersionToken> {
    let expected = VersionToken::parse(expected)?;
    let actual = hash(bytes);
    if actual != expected {
        return Err(HashError::ChecksumMismatch {
            expected: expected.0,
            actual: actual.0,
        });
    }
    Ok(actual)
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VersionToken {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
