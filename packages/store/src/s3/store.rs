//! S3 object operations

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use certchain_common::LoggingTransformer;

use super::client::build_client;
use super::config::S3Config;
use crate::traits::{ObjectMetadata, ObjectStore, StoredObject};
use crate::{Result, StoreError};

const PRECONDITION_FAILED: u16 = 412;

/// Object store backed by an S3 bucket
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    timeout: Duration,
}

impl S3Store {
    /// Resolve credentials and connect to the configured bucket
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn connect(config: &S3Config) -> Result<Self> {
        let client = build_client(config).await?;
        Ok(Self::from_client(client, config))
    }

    /// Wrap an existing client
    #[must_use]
    pub fn from_client(client: Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            timeout: config.request_timeout,
        }
    }

    /// Bucket this store writes to
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Bound a whole operation, body streaming included
    async fn bounded<T>(
        &self,
        operation: &'static str,
        key: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                key: key.to_string(),
                seconds: self.timeout.as_secs(),
            }),
        };
        let success = outcome.is_ok();
        LoggingTransformer::log_store_operation(operation, key, success);
        LoggingTransformer::log_performance_metric(operation, started.elapsed(), success);
        outcome
    }
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|response| response.status().as_u16())
}

/// Map an SDK failure to `StoreError::Io`, classifying retryability
fn io_error<E>(operation: &'static str, key: &str, err: &SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + 'static,
{
    let retryable = match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
        _ => status_of(err).is_some_and(|status| status >= 500 || status == 429),
    };
    StoreError::Io {
        operation,
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
        retryable,
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, key: &str) -> Result<StoredObject> {
        self.bounded("get", key, async {
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| {
                    let missing = err
                        .as_service_error()
                        .is_some_and(|service| service.is_no_such_key())
                        || status_of(&err) == Some(404);
                    if missing {
                        StoreError::NotFound(key.to_string())
                    } else {
                        io_error("get", key, &err)
                    }
                })?;

            let metadata = output.metadata().cloned().unwrap_or_default();
            let body = output
                .body
                .collect()
                .await
                .map_err(|err| StoreError::Io {
                    operation: "get",
                    key: key.to_string(),
                    message: err.to_string(),
                    retryable: true,
                })?
                .into_bytes()
                .to_vec();

            Ok(StoredObject { body, metadata })
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.bounded("head", key, async {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(err)
                    if err
                        .as_service_error()
                        .is_some_and(|service| service.is_not_found())
                        || status_of(&err) == Some(404) =>
                {
                    Ok(false)
                }
                Err(err) => Err(io_error("head", key, &err)),
            }
        })
        .await
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
        overwrite: bool,
    ) -> Result<()> {
        if !overwrite && self.exists(key).await? {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }

        self.bounded("put", key, async {
            let mut request = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type("application/x-pem-file")
                .set_metadata(Some(metadata))
                .body(ByteStream::from(body));
            if !overwrite {
                request = request.if_none_match("*");
            }
            request.send().await.map_err(|err| {
                if status_of(&err) == Some(PRECONDITION_FAILED) {
                    StoreError::AlreadyExists(key.to_string())
                } else {
                    io_error("put", key, &err)
                }
            })?;
            Ok(())
        })
        .await
    }
}
