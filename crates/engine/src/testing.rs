//! In-memory readers, writers and logs for exercising the engines.

use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use sync_core::{
    LogError, RawRecord, ReaderError, RecordReader, RecordWriter, Row, TransactionLog,
    WriterError,
};

/// Reader over records held in memory.
pub struct VecReader {
    path: PathBuf,
    headers: Option<Vec<String>>,
    records: VecDeque<RawRecord>,
}

impl VecReader {
    /// Records given as string cells under `headers`.
    pub fn new(headers: &[&str], rows: &[&[&str]]) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let records = rows
            .iter()
            .map(|cells| {
                headers
                    .iter()
                    .cloned()
                    .zip(cells.iter().map(|c| Value::String(c.to_string())))
                    .collect()
            })
            .collect();
        Self {
            path: PathBuf::from("memory.csv"),
            headers: Some(headers),
            records,
        }
    }

    /// Records whose columns are only known once read.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self {
            path: PathBuf::from("memory.csv"),
            headers: None,
            records: records.into(),
        }
    }
}

impl RecordReader for VecReader {
    fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    fn read_record(&mut self) -> Result<Option<RawRecord>, ReaderError> {
        Ok(self.records.pop_front())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Writer collecting rows in memory.
pub struct VecWriter {
    path: PathBuf,
    append: bool,
    pub rows: Vec<Vec<String>>,
    pub flushed: bool,
}

impl VecWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: false,
            rows: Vec::new(),
            flushed: false,
        }
    }

    /// Behave like a writer appending to a non-empty file.
    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }
}

impl RecordWriter for VecWriter {
    fn write_record(&mut self, values: &[String]) -> Result<(), WriterError> {
        self.rows.push(values.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriterError> {
        self.flushed = true;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_append(&self) -> bool {
        self.append
    }
}

/// Transaction log collecting entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub successes: Vec<Row>,
    /// Entries with their failure reason
    pub failures: Vec<(Row, String)>,
}

impl TransactionLog for MemoryLog {
    fn log_success(&mut self, row: &Row) -> Result<(), LogError> {
        self.successes.push(row.clone());
        Ok(())
    }

    fn log_failure(&mut self, row: &Row, reason: &str) -> Result<(), LogError> {
        self.failures.push((row.clone(), reason.to_string()));
        Ok(())
    }
}

/// Transaction log that discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl TransactionLog for NullLog {
    fn log_success(&mut self, _row: &Row) -> Result<(), LogError> {
        Ok(())
    }

    fn log_failure(&mut self, _row: &Row, _reason: &str) -> Result<(), LogError> {
        Ok(())
    }
}
