//! HTTP/HTTPS fetch and upload

use crate::{join_path, FileLocation, FileTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

/// Fetch a URL into memory.
pub(crate) async fn fetch(url: &str, token: Option<&str>) -> Result<Vec<u8>> {
    let client = reqwest::Client::new();
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to fetch URL: {url}"))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP request failed with status {status} for URL: {url}");
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from: {url}"))?;

    tracing::debug!("Fetched {} bytes from: {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

/// Uploads files with `PUT {base_url}/{name}`
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl FileTransport for HttpTransport {
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<FileLocation> {
        let body = tokio::fs::read(local)
            .await
            .with_context(|| format!("Failed to read file: {}", local.display()))?;
        let url = join_path(&self.base_url, remote_name);

        let mut request = self.client.put(&url).body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to upload to URL: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP upload failed with status {status} for URL: {url}");
        }

        tracing::debug!("Uploaded {} to {}", local.display(), url);
        Ok(FileLocation::Http(url))
    }
}
