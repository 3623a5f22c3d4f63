//! Object storage access over S3/MinIO
//!
//! The pipeline reads source videos from whichever bucket the triggering
//! event names and writes result CSVs to the configured output bucket, so
//! the bucket is an argument on every call rather than part of the client.

use crate::{StorageError, StorageResult};
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// S3/MinIO configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// AWS region (e.g., "us-west-2") or "us-east-1" for `MinIO`
    pub region: String,

    /// S3 endpoint (custom for `MinIO`, empty for AWS S3)
    pub endpoint: Option<String>,

    /// AWS access key ID
    pub access_key_id: String,

    /// AWS secret access key
    pub secret_access_key: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: None,
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        }
    }
}

/// Object storage trait
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object and save it to a local path
    async fn download_to_path(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<()>;

    /// Store an object from bytes, overwriting any existing one
    async fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Key of the first object listed in a bucket, if any
    async fn first_key(&self, bucket: &str) -> StorageResult<Option<String>>;
}

/// S3/MinIO object storage implementation
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Create a new S3 object storage client
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "rollcall-storage",
        );

        let region = Region::new(config.region.clone());

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(region)
            .behavior_version_latest();

        // Set custom endpoint for MinIO
        if let Some(endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true); // Required for MinIO
        }

        let s3_config = s3_config_builder.build();
        let client = Client::from_conf(s3_config);

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download_to_path(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<()> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::NotFound(format!("{bucket}/{key}"))
                } else {
                    StorageError::S3Error(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3Error(e.to_string()))?;

        tokio::fs::write(dest, bytes.to_vec()).await?;
        tracing::debug!("downloaded s3://{}/{} to {}", bucket, key, dest.display());
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> StorageResult<()> {
        let byte_stream = ByteStream::from(data.to_vec());

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(byte_stream)
            .send()
            .await
            .map_err(|e| StorageError::S3Error(e.to_string()))?;

        tracing::debug!("uploaded {} bytes to s3://{}/{}", data.len(), bucket, key);
        Ok(())
    }

    async fn first_key(&self, bucket: &str) -> StorageResult<Option<String>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| StorageError::S3Error(e.to_string()))?;

        let key = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(std::string::ToString::to_string))
            .next();

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_config_default() {
        let config = S3Config::default();
        assert!(!config.region.is_empty());
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn test_s3_config_with_minio() {
        let config = S3Config {
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
        };

        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
    }

    #[tokio::test]
    async fn test_client_construction_with_endpoint() {
        let config = S3Config {
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
        };

        // Construction never touches the network
        assert!(S3ObjectStore::new(config).await.is_ok());
    }
}
