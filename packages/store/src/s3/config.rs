//! S3 backend configuration

use std::fmt;
use std::time::Duration;

/// Default lease for assumed-role sessions, in seconds
pub const DEFAULT_SESSION_DURATION: u64 = 900;

/// Default timeout applied to every store operation
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Long-lived access key pair
#[derive(Clone)]
pub struct StaticCredentials {
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Role to assume before talking to the bucket
#[derive(Debug, Clone)]
pub struct RoleConfig {
    /// ARN of the role
    pub role_arn: String,
    /// Session name recorded by STS
    pub session_name: String,
    /// Lease of the temporary credentials
    pub session_duration: Duration,
}

impl RoleConfig {
    /// Role with the default session name and lease
    #[must_use]
    pub fn new(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            session_name: "certchain".to_string(),
            session_duration: Duration::from_secs(DEFAULT_SESSION_DURATION),
        }
    }
}

/// Connection settings for an S3 bucket
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,
    /// Bucket region
    pub region: String,
    /// Static credentials; the default provider chain is used when absent
    pub credentials: Option<StaticCredentials>,
    /// Exchanged for temporary credentials using `credentials` (or the chain)
    pub role: Option<RoleConfig>,
    /// Custom endpoint for S3-compatible providers
    pub endpoint: Option<String>,
    /// Use plain HTTP for `endpoint`
    pub disable_ssl: bool,
    /// Bound on each store operation
    pub request_timeout: Duration,
}

impl S3Config {
    /// Config for `bucket` in `us-east-1` with the default chain
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: "us-east-1".to_string(),
            credentials: None,
            role: None,
            endpoint: None,
            disable_ssl: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Endpoint URL with its scheme resolved against `disable_ssl`
    #[must_use]
    pub fn endpoint_url(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?.trim();
        if endpoint.is_empty() {
            return None;
        }
        let host = endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("http://"))
            .unwrap_or(endpoint);
        let scheme = if self.disable_ssl { "http" } else { "https" };
        Some(format!("{scheme}://{}", host.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_endpoint(endpoint: &str, disable_ssl: bool) -> S3Config {
        S3Config {
            endpoint: Some(endpoint.to_string()),
            disable_ssl,
            ..S3Config::new("bucket")
        }
    }

    #[test]
    fn endpoint_scheme_follows_disable_ssl() {
        assert_eq!(
            with_endpoint("minio.local:9000", true).endpoint_url().as_deref(),
            Some("http://minio.local:9000")
        );
        assert_eq!(
            with_endpoint("https://minio.local:9000/", true).endpoint_url().as_deref(),
            Some("http://minio.local:9000")
        );
        assert_eq!(
            with_endpoint("storage.example.com", false).endpoint_url().as_deref(),
            Some("https://storage.example.com")
        );
    }

    #[test]
    fn blank_endpoint_means_aws() {
        assert_eq!(with_endpoint("  ", false).endpoint_url(), None);
        assert_eq!(S3Config::new("bucket").endpoint_url(), None);
    }

    #[test]
    fn secret_is_not_debug_printed() {
        let creds = StaticCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
