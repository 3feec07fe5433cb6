//! Local directory transport

use crate::{FileLocation, FileTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Copies files into a local directory
pub struct LocalTransport {
    dir: PathBuf,
}

impl LocalTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileTransport for LocalTransport {
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<FileLocation> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;

        let target = self.dir.join(remote_name);
        let bytes = tokio::fs::copy(local, &target).await.with_context(|| {
            format!(
                "Failed to copy {} to {}",
                local.display(),
                target.display()
            )
        })?;

        tracing::debug!("Copied {} bytes to {}", bytes, target.display());
        Ok(FileLocation::Local(target))
    }
}
