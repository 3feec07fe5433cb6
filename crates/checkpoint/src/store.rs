//! Run history storage trait and types

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Key to unix timestamp (seconds) of the last successful run.
pub type RunHistory = BTreeMap<String, i64>;

/// Trait for run history storage operations.
///
/// Implementations must make `record_run` visible to a later `last_run`
/// on a fresh instance pointing at the same backend.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Timestamp of the last successful run for `key`.
    ///
    /// Returns None if the key has never been recorded.
    async fn last_run(&self, key: &str) -> Result<Option<i64>>;

    /// Record a successful run for `key` at `timestamp`.
    async fn record_run(&self, key: &str, timestamp: i64) -> Result<()>;
}
