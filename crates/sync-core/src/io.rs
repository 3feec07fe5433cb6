//! Reader, writer and transaction log contracts.
//!
//! The CSV crate implements these; the engines only see the traits.

use std::path::Path;

use crate::values::{RawRecord, Row};

/// Failure while reading the input source. Fatal to an import run.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be decoded
    #[error("Malformed record at line {line}: {message}")]
    Malformed { line: u64, message: String },
}

/// Failure while writing the output file. Fatal to an export run.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode record: {0}")]
    Encode(String),
}

/// Failure while writing a transaction log entry. Fatal to an import run.
#[derive(Debug, thiserror::Error)]
#[error("Failed to write transaction log '{path}': {message}")]
pub struct LogError {
    pub path: String,
    pub message: String,
}

/// Sequential source of raw records.
///
/// When the source has a header row it has already been consumed and
/// [`RecordReader::headers`] returns it.
pub trait RecordReader: Send {
    /// Column names, when the source knows them up front.
    fn headers(&self) -> Option<&[String]>;

    /// Next record, or `None` once the source is exhausted.
    fn read_record(&mut self) -> Result<Option<RawRecord>, ReaderError>;

    /// Location of the source, used in logs and log file names.
    fn path(&self) -> &Path;
}

/// Sequential sink of output rows.
pub trait RecordWriter: Send {
    fn write_record(&mut self, values: &[String]) -> Result<(), WriterError>;

    fn flush(&mut self) -> Result<(), WriterError>;

    fn path(&self) -> &Path;

    /// Whether rows are appended to existing content.
    fn is_append(&self) -> bool;
}

/// Per-record outcome log of an import run.
pub trait TransactionLog: Send {
    fn log_success(&mut self, row: &Row) -> Result<(), LogError>;

    fn log_failure(&mut self, row: &Row, reason: &str) -> Result<(), LogError>;
}
