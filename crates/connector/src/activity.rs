//! Run summary sent to the remote activity endpoint.

use serde::{Deserialize, Serialize};

/// Kind of run that produced an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Import,
    Sync,
    Export,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import => write!(f, "import"),
            Self::Sync => write!(f, "sync"),
            Self::Export => write!(f, "export"),
        }
    }
}

/// Audit record emitted once at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub run_id: String,
    pub kind: RunKind,
    pub object: String,
    pub file: String,
    pub success: u64,
    pub failed: u64,
    pub deleted: u64,
    pub duration_secs: f64,
    pub message: String,
    /// Unix seconds
    pub finished_at: i64,
}
