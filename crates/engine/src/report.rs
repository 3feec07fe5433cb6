//! Run reports and per-record outcomes.

use std::time::Duration;
use tabsync_file::FileLocation;

/// Result of processing one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Success,
    Failure(String),
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RecordOutcome::Success)
    }
}

impl<E: std::fmt::Display> From<Result<(), E>> for RecordOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => RecordOutcome::Success,
            Err(e) => RecordOutcome::Failure(e.to_string()),
        }
    }
}

/// Counters of an import (and sync) run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub success: u64,
    pub failed: u64,
    pub deleted: u64,
    pub duration: Duration,
}

/// Counters of an export run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub written: u64,
    pub failed: u64,
    pub pages: u64,
    pub duration: Duration,
    /// Where the file was forwarded, if a transport was configured
    pub uploaded_to: Option<FileLocation>,
}
