//! S3 storage backend.
//!
//! Works against AWS S3 and S3-compatible providers (MinIO, DigitalOcean
//! Spaces) via an optional custom endpoint with path-style addressing.

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::{validate_key, Storage, StorageError, StorageResult, StoredObject};

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3Storage {
    /// Create a new S3Storage instance.
    ///
    /// `endpoint_url` selects an S3-compatible provider and switches to
    /// path-style addressing.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            let mut builder = aws_sdk_s3::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .retry_config(retry_config);
            // Path-style addressing is required by MinIO and most
            // S3-compatible providers.
            builder = builder.force_path_style(true);
            Client::from_conf(builder.build())
        } else {
            Client::new(&config)
        };

        Ok(S3Storage {
            client,
            bucket,
            region,
            endpoint_url,
        })
    }
}

#[async_trait]
impl Storage for S3Storage {
    #[tracing::instrument(skip(self, data), fields(bucket = %self.bucket, key = %key, size = data.len()))]
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        validate_key(key)?;
        let size_bytes = data.len() as i64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 put_object failed: {}", e)))?;

        tracing::debug!(size_bytes, "Object uploaded to S3");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size_bytes,
        })
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn download(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(se) if matches!(se.err(), GetObjectError::NoSuchKey(_)) => {
                    StorageError::NotFound(key.to_string())
                }
                _ => StorageError::Backend(format!("S3 get_object failed: {}", e)),
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 body read failed: {}", e)))?;

        Ok(data.into_bytes())
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        // delete_object on a missing key succeeds, matching the trait
        // contract.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 delete_object failed: {}", e)))?;
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}
