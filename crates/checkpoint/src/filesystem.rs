//! Filesystem-based run history storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::store::{HistoryStore, RunHistory};

/// Filesystem implementation of HistoryStore trait.
///
/// Stores the whole history as one JSON object. Writes go to a sibling
/// temporary file that is renamed over the original.
pub struct FilesystemStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FilesystemStore {
    /// Open the history file at `path`, creating `{}` (and parent
    /// directories) if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory {}", parent.display())
                })?;
            }
            write_atomic(&path, &RunHistory::new())?;
            tracing::info!("Created run history file {}", path.display());
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Get the history file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full history.
    pub fn load(&self) -> Result<RunHistory> {
        if !self.path.exists() {
            return Ok(RunHistory::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read run history {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(RunHistory::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid run history file {}", self.path.display()))
    }
}

fn write_atomic(path: &Path, history: &RunHistory) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, serde_json::to_string_pretty(history)?)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl HistoryStore for FilesystemStore {
    async fn last_run(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.load()?.get(key).copied())
    }

    async fn record_run(&self, key: &str, timestamp: i64) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("run history lock poisoned"))?;
        let mut history = self.load()?;
        history.insert(key.to_string(), timestamp);
        write_atomic(&self.path, &history)?;

        let at = chrono::DateTime::from_timestamp(timestamp, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| timestamp.to_string());
        tracing::info!(
            "Recorded run of '{}' at {} in {}",
            key,
            at,
            self.path.display()
        );
        Ok(())
    }
}
