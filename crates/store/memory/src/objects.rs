use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use bodylog_store::error::StorageError;
use bodylog_store::objects::ObjectStorage;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// In-memory [`ObjectStorage`] backed by a [`DashMap`].
///
/// Signed URLs use a `memory://` scheme and carry their expiry as a query
/// parameter; they are only meaningful to tests.
#[derive(Debug)]
pub struct MemoryObjectStorage {
    bucket: String,
    objects: DashMap<String, StoredObject>,
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new("bodylog")
    }
}

impl MemoryObjectStorage {
    /// Create a new, empty storage for `bucket`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    /// Whether an object exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    /// The content and content type stored at `path`.
    pub fn get(&self, path: &str) -> Option<(Bytes, String)> {
        self.objects
            .get(path)
            .map(|o| (o.data.clone(), o.content_type.clone()))
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.iter().map(|o| o.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StorageError> {
        let object = StoredObject {
            data,
            content_type: content_type.to_owned(),
        };
        match self.objects.entry(path.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if !upsert {
                    return Err(StorageError::AlreadyExists(path.to_owned()));
                }
                occupied.insert(object);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(object);
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.objects.remove(path).is_some())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.objects.contains_key(path) {
            return Err(StorageError::NotFound(path.to_owned()));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Storage(format!("invalid ttl: {e}")))?;
        let expires = (Utc::now() + ttl).timestamp();
        let token = uuid::Uuid::new_v4().simple();
        Ok(format!(
            "memory://{}/{path}?expires={expires}&token={token}",
            self.bucket
        ))
    }
}
