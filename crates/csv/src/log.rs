//! CSV transaction log
//!
//! An import writes two files next to its input (or into a configured
//! directory):
//!
//! - `{basename}_success_{YYYYMMDD_HHMMSS}.{ext}`
//! - `{basename}_failure_{YYYYMMDD_HHMMSS}.{ext}`, whose header ends with an
//!   `error` column holding the failure reason
//!
//! Both files are created with their header row when the log is opened with
//! a known header. Without one, the columns come from the first logged row
//! and each file is created on its first entry.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use sync_core::{value_to_string, LogError, Row, TransactionLog};

const ERROR_COLUMN: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Success,
    Failure,
}

impl LogKind {
    fn as_str(&self) -> &'static str {
        match self {
            LogKind::Success => "success",
            LogKind::Failure => "failure",
        }
    }
}

/// File name of a transaction log for `data_path`.
pub fn log_file_name(data_path: &Path, kind: LogKind, at: &NaiveDateTime) -> String {
    let stem = data_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("import");
    let ext = data_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("csv");
    format!(
        "{stem}_{}_{}.{ext}",
        kind.as_str(),
        at.format("%Y%m%d_%H%M%S")
    )
}

struct LogFile {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    entries: u64,
}

impl LogFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: None,
            entries: 0,
        }
    }

    fn open(&self, header: &[String], delimiter: u8) -> Result<csv::Writer<File>, LogError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| log_error(&self.path, e))?;
        writer
            .write_record(header)
            .map_err(|e| log_error(&self.path, e))?;
        writer.flush().map_err(|e| log_error(&self.path, e))?;
        tracing::debug!("Created transaction log {}", self.path.display());
        Ok(writer)
    }

    fn write(
        &mut self,
        header: &[String],
        values: Vec<String>,
        delimiter: u8,
    ) -> Result<(), LogError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.open(header, delimiter)?,
        };
        let writer = self.writer.insert(writer);
        writer
            .write_record(&values)
            .map_err(|e| log_error(&self.path, e))?;
        writer.flush().map_err(|e| log_error(&self.path, e))?;
        self.entries += 1;
        Ok(())
    }
}

fn log_error(path: &Path, err: impl std::fmt::Display) -> LogError {
    LogError {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Success and failure CSV files of one import run.
///
/// Columns are fixed by the header passed to [`CsvTransactionLog::new`] or,
/// when none is given, by the keys of the first logged row. Values missing
/// from a row are written as empty cells.
pub struct CsvTransactionLog {
    header: Option<Vec<String>>,
    delimiter: u8,
    success: LogFile,
    failure: LogFile,
}

impl CsvTransactionLog {
    /// Log for the input `data_path`, written into `dir` (default: the
    /// input's directory).
    pub fn new(
        data_path: &Path,
        dir: Option<&Path>,
        header: Option<Vec<String>>,
        delimiter: u8,
    ) -> Result<Self, LogError> {
        let dir = dir
            .map(Path::to_path_buf)
            .or_else(|| data_path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&dir).map_err(|e| log_error(&dir, e))?;
        }

        let now = chrono::Local::now().naive_local();
        let mut success = LogFile::new(dir.join(log_file_name(data_path, LogKind::Success, &now)));
        let mut failure = LogFile::new(dir.join(log_file_name(data_path, LogKind::Failure, &now)));
        if let Some(header) = &header {
            success.writer = Some(success.open(header, delimiter)?);
            failure.writer = Some(failure.open(&failure_header(header), delimiter)?);
        }
        Ok(Self {
            header,
            delimiter,
            success,
            failure,
        })
    }

    pub fn success_path(&self) -> &Path {
        &self.success.path
    }

    pub fn failure_path(&self) -> &Path {
        &self.failure.path
    }

    pub fn success_count(&self) -> u64 {
        self.success.entries
    }

    pub fn failure_count(&self) -> u64 {
        self.failure.entries
    }

    fn header_for(&mut self, row: &Row) -> Vec<String> {
        self.header
            .get_or_insert_with(|| row.keys().cloned().collect())
            .clone()
    }
}

fn failure_header(header: &[String]) -> Vec<String> {
    let mut header = header.to_vec();
    if !header.iter().any(|h| h == ERROR_COLUMN) {
        header.push(ERROR_COLUMN.to_string());
    }
    header
}

fn values_for(header: &[String], row: &Row) -> Vec<String> {
    header
        .iter()
        .map(|h| row.get(h).map(value_to_string).unwrap_or_default())
        .collect()
}

impl TransactionLog for CsvTransactionLog {
    fn log_success(&mut self, row: &Row) -> Result<(), LogError> {
        let header = self.header_for(row);
        let values = values_for(&header, row);
        self.success.write(&header, values, self.delimiter)
    }

    fn log_failure(&mut self, row: &Row, reason: &str) -> Result<(), LogError> {
        let mut header = self.header_for(row);
        let mut values = values_for(&header, row);
        match header.iter().position(|h| h == ERROR_COLUMN) {
            Some(index) => values[index] = reason.to_string(),
            None => {
                header.push(ERROR_COLUMN.to_string());
                values.push(reason.to_string());
            }
        }
        self.failure.write(&header, values, self.delimiter)
    }
}
