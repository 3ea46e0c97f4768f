use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, error, info, instrument};

use bodylog_store::error::StorageError;
use bodylog_store::objects::ObjectStorage;

use crate::config::{S3Config, build_client};

/// [`ObjectStorage`] backed by an S3 bucket.
///
/// Signed URLs are presigned `GetObject` requests.
pub struct S3ObjectStorage {
    config: S3Config,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStorage")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3ObjectStorage {
    /// Create a new `S3ObjectStorage` by building an AWS SDK client.
    pub async fn new(config: S3Config) -> Self {
        let client = build_client(&config).await;
        Self { config, client }
    }

    /// Create an `S3ObjectStorage` with a pre-built client.
    pub fn with_client(config: S3Config, client: aws_sdk_s3::Client) -> Self {
        Self { config, client }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => {
                error!(key = %key, error = %e, "S3 head_object failed");
                Err(StorageError::Storage(format!("head_object failed: {e}")))
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    #[instrument(skip(self, data), fields(bucket = %self.config.bucket, size = data.len()))]
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StorageError> {
        let key = self.config.object_key(path);
        if !upsert && self.exists(&key).await? {
            return Err(StorageError::AlreadyExists(path.to_owned()));
        }

        debug!(key = %key, "uploading object to S3");
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "S3 put_object failed");
                StorageError::Storage(format!("put_object failed: {e}"))
            })?;

        info!(key = %key, "S3 object uploaded");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let key = self.config.object_key(path);
        // DeleteObject succeeds for missing keys, so existence is probed first.
        if !self.exists(&key).await? {
            return Ok(false);
        }

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "S3 delete_object failed");
                StorageError::Storage(format!("delete_object failed: {e}"))
            })?;

        info!(key = %key, "S3 object deleted");
        Ok(true)
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let key = self.config.object_key(path);
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Storage(format!("invalid presign ttl: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Storage(format!("presign failed: {e}")))?;

        Ok(request.uri().to_string())
    }
}
