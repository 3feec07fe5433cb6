//! S3 fetch and upload

use crate::{join_path, FileLocation, FileTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

/// Shared S3 client
///
/// Creating an S3 client is relatively expensive, so a transport keeps one
/// for all of its uploads.
pub(crate) struct S3Client {
    client: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from AWS config
    pub(crate) async fn new() -> Result<Self> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        Ok(Self { client })
    }

    /// Read a whole object into memory
    pub(crate) async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch object from S3: s3://{bucket}/{key}"))?;

        let bytes = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read object body: s3://{bucket}/{key}"))?;
        Ok(bytes.into_bytes().to_vec())
    }

    pub(crate) async fn put(&self, bucket: &str, key: &str, local: &Path) -> Result<()> {
        let body = ByteStream::from_path(local)
            .await
            .with_context(|| format!("Failed to read file: {}", local.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload to S3: s3://{bucket}/{key}"))?;
        Ok(())
    }
}

/// Uploads files under an S3 prefix
pub struct S3Transport {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3Transport {
    pub async fn new(bucket: String, prefix: String) -> Result<Self> {
        Ok(Self {
            client: S3Client::new().await?,
            bucket,
            prefix,
        })
    }
}

#[async_trait]
impl FileTransport for S3Transport {
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<FileLocation> {
        let key = join_path(&self.prefix, remote_name);
        self.client.put(&self.bucket, &key, local).await?;

        tracing::debug!(
            "Uploaded {} to s3://{}/{}",
            local.display(),
            self.bucket,
            key
        );
        Ok(FileLocation::S3 {
            bucket: self.bucket.clone(),
            key,
        })
    }
}
