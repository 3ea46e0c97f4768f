use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the S3 object storage backend.
///
/// Works against AWS S3 and S3-compatible services; set `endpoint_url` and
/// `force_path_style` for local development (e.g. `MinIO` or `LocalStack`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// AWS region (e.g. `"us-east-1"`).
    pub region: String,

    /// Bucket holding uploaded photos.
    pub bucket: String,

    /// Key prefix prepended to every object path (e.g. `"bodylog/"`).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Optional endpoint URL override.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Address buckets by path instead of virtual host.
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self::new("us-east-1", "med_docs_bucket")
    }
}

impl S3Config {
    /// Create a new `S3Config` for `bucket` in `region`.
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            bucket: bucket.into(),
            prefix: None,
            endpoint_url: None,
            force_path_style: false,
        }
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set an endpoint URL override for local development.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Use path-style bucket addressing.
    #[must_use]
    pub fn with_path_style(mut self) -> Self {
        self.force_path_style = true;
        self
    }

    /// Apply the configured prefix to an object path.
    pub(crate) fn object_key(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{path}"),
            None => path.to_owned(),
        }
    }
}

/// Build an S3 client from the standard AWS environment credential chain,
/// applying the region, endpoint override and addressing style.
pub async fn build_client(config: &S3Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom S3 endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_sets_region_and_bucket() {
        let config = S3Config::new("eu-west-1", "photos");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.bucket, "photos");
        assert!(config.prefix.is_none());
        assert!(!config.force_path_style);
    }

    #[test]
    fn builder_chain() {
        let config = S3Config::new("us-east-1", "photos")
            .with_prefix("bodylog/")
            .with_endpoint_url("http://localhost:9000")
            .with_path_style();
        assert_eq!(config.prefix.as_deref(), Some("bodylog/"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert!(config.force_path_style);
    }

    #[test]
    fn object_key_applies_prefix() {
        let plain = S3Config::default();
        assert_eq!(plain.object_key("u/d/1_a_b.png"), "u/d/1_a_b.png");

        let prefixed = S3Config::default().with_prefix("bodylog/");
        assert_eq!(prefixed.object_key("u/d/1_a_b.png"), "bodylog/u/d/1_a_b.png");
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: S3Config =
            serde_json::from_str(r#"{"region":"us-west-2","bucket":"docs"}"#).unwrap();
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.bucket, "docs");
        assert!(config.endpoint_url.is_none());
        assert!(!config.force_path_style);
    }

    #[test]
    fn debug_shows_bucket_and_endpoint() {
        let config = S3Config::new("us-east-1", "photos").with_endpoint_url("http://minio:9000");
        let debug = format!("{config:?}");
        assert!(debug.contains("photos"));
        assert!(debug.contains("http://minio:9000"));
    }
}
