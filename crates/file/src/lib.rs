//! File locations and transports
//!
//! Import inputs may live on the local filesystem, in S3 or behind an HTTP
//! URL; they are fetched before the CSV reader opens them. Exported files
//! are forwarded to a destination directory, S3 prefix or HTTP endpoint
//! through the [`FileTransport`] trait.
//!
//! # Location Types
//!
//! - **Local**: `/data/out/` or `out/contacts.csv`
//! - **S3**: `s3://bucket/prefix/`
//! - **HTTP/HTTPS**: `https://files.example.com/upload/`
//!
//! # Example
//!
//! ```ignore
//! use tabsync_file::{transport_for, FileLocation};
//!
//! let destination = FileLocation::parse("s3://exports/daily/")?;
//! let transport = transport_for(&destination, None).await?;
//! transport.upload(Path::new("contacts.csv"), "contacts.csv").await?;
//! ```

mod http;
mod local;
mod s3;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use http::HttpTransport;
pub use local::LocalTransport;
pub use s3::S3Transport;

/// A file or directory location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    /// Local filesystem path
    Local(PathBuf),
    /// S3 object or prefix
    S3 { bucket: String, key: String },
    /// HTTP/HTTPS URL
    Http(String),
}

impl FileLocation {
    /// Parse a string into a FileLocation, auto-detecting the type
    ///
    /// - `s3://bucket/key` -> S3
    /// - `http://` or `https://` -> Http
    /// - Everything else -> Local
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.starts_with("s3://") {
            let (bucket, key) = parse_s3_uri(uri)?;
            Ok(FileLocation::S3 { bucket, key })
        } else if uri.starts_with("http://") || uri.starts_with("https://") {
            Ok(FileLocation::Http(uri.to_string()))
        } else {
            Ok(FileLocation::Local(PathBuf::from(uri)))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, FileLocation::Local(_))
    }

    /// Treat this location as a directory and append `name`.
    pub fn join(&self, name: &str) -> Self {
        match self {
            FileLocation::Local(path) => FileLocation::Local(path.join(name)),
            FileLocation::S3 { bucket, key } => FileLocation::S3 {
                bucket: bucket.clone(),
                key: join_path(key, name),
            },
            FileLocation::Http(url) => FileLocation::Http(join_path(url, name)),
        }
    }

    /// Last path component, without any query string
    pub fn file_name(&self) -> Option<&str> {
        let name = match self {
            FileLocation::Local(path) => path.file_name().and_then(|n| n.to_str()),
            FileLocation::S3 { key, .. } => key.rsplit('/').next(),
            FileLocation::Http(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|path| path.rsplit('/').next()),
        };
        name.filter(|n| !n.is_empty())
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            FileLocation::Local(path) => path.display().to_string(),
            FileLocation::S3 { bucket, key } => format!("s3://{bucket}/{key}"),
            FileLocation::Http(url) => url.clone(),
        }
    }

    /// Fetch this location into `dir`, returning the local path.
    ///
    /// Local files are returned as-is.
    pub async fn fetch_into(&self, dir: &Path) -> Result<PathBuf> {
        let (bytes, name) = match self {
            FileLocation::Local(path) => return Ok(path.clone()),
            FileLocation::S3 { bucket, key } => {
                let client = s3::S3Client::new().await?;
                (client.get(bucket, key).await?, self.file_name())
            }
            FileLocation::Http(url) => (http::fetch(url, None).await?, self.file_name()),
        };

        let target = dir.join(name.unwrap_or("download"));
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("Failed to write file: {}", target.display()))?;

        tracing::info!(
            "Fetched {} ({} bytes) to {}",
            self.display_name(),
            bytes.len(),
            target.display()
        );
        Ok(target)
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Parse S3 URI in the format: s3://bucket/key/to/file
pub fn parse_s3_uri(uri: &str) -> Result<(String, String)> {
    let uri = uri
        .strip_prefix("s3://")
        .context("S3 URI must start with 's3://'")?;

    match uri.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() => Ok((bucket.to_string(), key.to_string())),
        _ => anyhow::bail!("S3 URI must be in format 's3://bucket/key/to/file'"),
    }
}

/// Forwards a finished local file to a remote destination.
#[async_trait]
pub trait FileTransport: Send + Sync {
    /// Upload `local` under `remote_name` and return where it landed.
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<FileLocation>;
}

/// Build the transport for a destination directory/prefix.
///
/// `token` is sent as a bearer token by the HTTP transport.
pub async fn transport_for(
    destination: &FileLocation,
    token: Option<String>,
) -> Result<Box<dyn FileTransport>> {
    Ok(match destination {
        FileLocation::Local(dir) => Box::new(LocalTransport::new(dir.clone())),
        FileLocation::S3 { bucket, key } => {
            Box::new(S3Transport::new(bucket.clone(), key.clone()).await?)
        }
        FileLocation::Http(url) => Box::new(HttpTransport::new(url.clone(), token)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locations() {
        assert!(matches!(
            FileLocation::parse("/data/file.csv").unwrap(),
            FileLocation::Local(_)
        ));
        assert_eq!(
            FileLocation::parse("s3://my-bucket/data/").unwrap(),
            FileLocation::S3 {
                bucket: "my-bucket".to_string(),
                key: "data/".to_string()
            }
        );
        assert!(matches!(
            FileLocation::parse("https://example.com/data.csv").unwrap(),
            FileLocation::Http(_)
        ));
    }

    #[test]
    fn test_join() {
        let s3 = FileLocation::parse("s3://b/exports").unwrap();
        assert_eq!(s3.join("a.csv").display_name(), "s3://b/exports/a.csv");

        let root = FileLocation::parse("s3://b/").unwrap();
        assert_eq!(root.join("a.csv").display_name(), "s3://b/a.csv");

        let http = FileLocation::parse("https://x.io/up/").unwrap();
        assert_eq!(http.join("a.csv").display_name(), "https://x.io/up/a.csv");
    }

    #[test]
    fn test_file_name() {
        let http = FileLocation::parse("https://x.io/files/data.csv?token=1").unwrap();
        assert_eq!(http.file_name(), Some("data.csv"));

        let prefix = FileLocation::parse("s3://b/dir/").unwrap();
        assert_eq!(prefix.file_name(), None);

        let local = FileLocation::parse("in/contacts.csv").unwrap();
        assert_eq!(local.file_name(), Some("contacts.csv"));
    }

    #[test]
    fn test_parse_s3_uri_invalid() {
        assert!(parse_s3_uri("my-bucket/path").is_err());
        assert!(parse_s3_uri("s3://my-bucket").is_err());
        assert!(parse_s3_uri("s3:///key").is_err());
    }

    #[tokio::test]
    async fn test_fetch_local_is_identity() {
        let location = FileLocation::parse("/data/in.csv").unwrap();
        let path = location.fetch_into(Path::new("/tmp")).await.unwrap();
        assert_eq!(path, PathBuf::from("/data/in.csv"));
    }
}
