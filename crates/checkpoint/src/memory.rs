use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use crate::store::{HistoryStore, RunHistory};

/// In-memory HistoryStore. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    history: Mutex<RunHistory>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing history.
    pub fn with_history(history: RunHistory) -> Self {
        Self {
            history: Mutex::new(history),
        }
    }

    pub fn snapshot(&self) -> RunHistory {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn last_run(&self, key: &str) -> Result<Option<i64>> {
        let history = self
            .history
            .lock()
            .map_err(|_| anyhow::anyhow!("run history lock poisoned"))?;
        Ok(history.get(key).copied())
    }

    async fn record_run(&self, key: &str, timestamp: i64) -> Result<()> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| anyhow::anyhow!("run history lock poisoned"))?;
        history.insert(key.to_string(), timestamp);
        Ok(())
    }
}
