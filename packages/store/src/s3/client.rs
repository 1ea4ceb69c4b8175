//! S3 client setup
//!
//! Credential handling, role assumption, region, endpoint and timeouts.

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use log::{debug, info};

use super::config::S3Config;
use crate::{Result, StoreError};

const CREDENTIALS_PROVIDER_NAME: &str = "certchain-source";

/// Build an S3 client for `config`
///
/// Static credentials, when given, seed the provider; otherwise the default
/// chain (environment, profile, instance metadata) is used. A configured role
/// is then assumed on top of whichever base credentials were resolved.
///
/// # Errors
///
/// Returns `StoreError::Config` for an empty bucket or role name.
pub async fn build_client(config: &S3Config) -> Result<Client> {
    if config.bucket.trim().is_empty() {
        return Err(StoreError::Config("bucket name must not be empty".to_string()));
    }

    let region = Region::new(config.region.clone());
    // Whole operations are bounded by `S3Store`; the SDK only bounds connects
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(config.request_timeout)
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(region.clone())
        .timeout_config(timeouts);
    if let Some(creds) = &config.credentials {
        loader = loader.credentials_provider(Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        ));
    }
    let base = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&base);

    if let Some(role) = &config.role {
        if role.role_arn.trim().is_empty() {
            return Err(StoreError::Config("role_arn must not be empty".to_string()));
        }
        info!(
            "Assuming role {} (session {}, {}s)",
            role.role_arn,
            role.session_name,
            role.session_duration.as_secs()
        );
        let provider = AssumeRoleProvider::builder(role.role_arn.clone())
            .session_name(role.session_name.clone())
            .session_length(role.session_duration)
            .region(region)
            .configure(&base)
            .build()
            .await;
        builder = builder.credentials_provider(provider);
    }

    if let Some(url) = config.endpoint_url() {
        debug!("Using custom S3 endpoint {url}");
        builder = builder.endpoint_url(url).force_path_style(true);
    }

    Ok(Client::from_conf(builder.build()))
}
