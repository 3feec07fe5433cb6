//! Run-level errors.

use sync_core::{ConfigError, LogError, ReaderError, WriterError};
use tabsync_connector::ConnectorError;

/// Failure that aborts a whole import, sync or export run.
///
/// Record-level problems never surface here; they are counted and routed to
/// the transaction log instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connection, structure discovery or paging failed
    #[error("Remote connector failed: {0}")]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error(transparent)]
    TransactionLog(#[from] LogError),

    #[error("Run history failed: {0:#}")]
    History(anyhow::Error),

    /// Forwarding the finished export failed; the local file is complete
    #[error("Failed to transfer exported file: {0:#}")]
    Transfer(anyhow::Error),
}
