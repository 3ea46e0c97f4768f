use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Deserialize;
use tracing::info;

use bodylog_store::{ObjectStorage, RecordStore};
use bodylog_store_memory::{MemoryObjectStorage, MemoryRecordStore};
use bodylog_store_postgres::{PostgresConfig, PostgresRecordStore};
use bodylog_store_s3::{S3Config, S3ObjectStorage};

/// Top-level `bodylog.toml` configuration.
#[derive(Debug, Default, Deserialize)]
pub struct BodyLogConfig {
    #[serde(default)]
    pub records: RecordsConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where entries and documents are persisted.
#[derive(Debug, Deserialize)]
pub struct RecordsConfig {
    /// Which backend to use: `"memory"` or `"postgres"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            postgres: PostgresConfig::default(),
        }
    }
}

/// Where uploaded photos are stored.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use: `"memory"` or `"s3"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Bucket name for the memory backend.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default)]
    pub s3: S3Config,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: default_bucket(),
            s3: S3Config::default(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_owned()
}

fn default_bucket() -> String {
    "med_docs_bucket".to_owned()
}

impl BodyLogConfig {
    /// Load configuration from `path`, or use defaults if the file does not
    /// exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(toml::from_str("")?);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub async fn record_store(&self) -> anyhow::Result<Arc<dyn RecordStore>> {
        match self.records.backend.as_str() {
            "memory" => Ok(Arc::new(MemoryRecordStore::new())),
            "postgres" => {
                info!(schema = %self.records.postgres.schema, "connecting to postgres");
                let store = PostgresRecordStore::new(self.records.postgres.clone()).await?;
                Ok(Arc::new(store))
            }
            other => bail!("unknown records backend '{other}' (expected 'memory' or 'postgres')"),
        }
    }

    pub async fn object_storage(&self) -> anyhow::Result<Arc<dyn ObjectStorage>> {
        match self.storage.backend.as_str() {
            "memory" => Ok(Arc::new(MemoryObjectStorage::new(
                self.storage.bucket.clone(),
            ))),
            "s3" => {
                info!(bucket = %self.storage.s3.bucket, "using s3 object storage");
                Ok(Arc::new(S3ObjectStorage::new(self.storage.s3.clone()).await))
            }
            other => bail!("unknown storage backend '{other}' (expected 'memory' or 's3')"),
        }
    }
}
