use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Default lifetime of a signed access URL.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Remote object storage for uploaded photos.
///
/// Objects are addressed by slash-separated paths within a single bucket.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` at `path`.
    ///
    /// With `upsert` an existing object is overwritten; without it the upload
    /// fails with [`StorageError::AlreadyExists`].
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StorageError>;

    /// Delete the object at `path`. Returns `true` if it existed.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;

    /// Issue a time-limited URL granting read access to `path`.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;
}
