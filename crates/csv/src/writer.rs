//! CSV row writer

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use sync_core::{RecordWriter, WriterError};

/// Writes export rows to a CSV file.
pub struct CsvWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    append: bool,
}

impl CsvWriter {
    /// Create or truncate `path`.
    pub fn create(path: impl Into<PathBuf>, delimiter: u8) -> Result<Self, WriterError> {
        Self::open(path.into(), delimiter, false)
    }

    /// Append to `path`. The writer only reports itself as appending when
    /// the file already had content, so a fresh file still gets a header.
    pub fn append(path: impl Into<PathBuf>, delimiter: u8) -> Result<Self, WriterError> {
        Self::open(path.into(), delimiter, true)
    }

    fn open(path: PathBuf, delimiter: u8, append: bool) -> Result<Self, WriterError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let had_content = append
            && std::fs::metadata(&path)
                .map(|m| m.len() > 0)
                .unwrap_or(false);

        let file = if append {
            OpenOptions::new().create(true).append(true).open(&path)?
        } else {
            File::create(&path)?
        };

        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(file);

        Ok(Self {
            writer,
            path,
            append: had_content,
        })
    }
}

fn writer_error(err: csv::Error) -> WriterError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => WriterError::Io(e),
        _ => WriterError::Encode(message),
    }
}

impl RecordWriter for CsvWriter {
    fn write_record(&mut self, values: &[String]) -> Result<(), WriterError> {
        self.writer.write_record(values).map_err(writer_error)
    }

    fn flush(&mut self) -> Result<(), WriterError> {
        self.writer.flush()?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_append(&self) -> bool {
        self.append
    }
}
