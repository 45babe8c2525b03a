use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Persistence port for generated images and CSV exports.
///
/// Keys are flat object paths (`<namespace>/<profile_id>/<profile_id>_<n>`,
/// `downloads/<name>.csv`). `put` returns the public URL of the stored
/// object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, prefix: &str) -> Result<bool, StorageError>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Public URL for an already-stored key.
    fn public_url(&self, key: &str) -> String;
}

/// Client for DigitalOcean Spaces object storage (S3-compatible).
pub struct SpacesClient {
    bucket: Box<Bucket>,
    origin_endpoint: String,
}

impl SpacesClient {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        origin_endpoint: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            bucket,
            origin_endpoint: origin_endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for SpacesClient {
    async fn exists(&self, prefix: &str) -> Result<bool, StorageError> {
        Ok(!self.list(prefix).await?.is_empty())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(StorageError::S3)?;

        let mut keys = Vec::new();
        for page in pages {
            for object in page.contents {
                // Skip directory markers some S3 browsers leave behind.
                if !object.key.ends_with('/') {
                    keys.push(object.key);
                }
            }
        }
        Ok(keys)
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.origin_endpoint, key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
