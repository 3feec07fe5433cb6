//! CSV record reader

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sync_core::{RawRecord, ReaderError, RecordReader};

/// Configuration for reading and writing CSV files
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Whether the first line is a header row (default: true)
    pub has_headers: bool,

    /// CSV delimiter character (default: ',')
    pub delimiter: u8,

    /// Optional column names when has_headers is false
    pub column_names: Option<Vec<String>>,

    /// Trim surrounding whitespace from every cell
    pub trim: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_headers: true,
            delimiter: b',',
            column_names: None,
            trim: false,
        }
    }
}

/// Reads raw records from a CSV source.
///
/// Cells become `Value::String`. Rows shorter than the header simply lack
/// the trailing keys; longer rows get `column_{i}` keys for the extra cells.
pub struct CsvReader {
    reader: csv::Reader<Box<dyn Read + Send>>,
    headers: Option<Vec<String>>,
    record: csv::StringRecord,
    path: PathBuf,
}

impl CsvReader {
    /// Open a local CSV file.
    pub fn open(path: impl Into<PathBuf>, options: &CsvOptions) -> Result<Self, ReaderError> {
        let path = path.into();
        let file = File::open(&path)?;
        Self::from_reader(Box::new(file), path, options)
    }

    /// Read CSV from any source; `path` only names it.
    pub fn from_reader(
        source: Box<dyn Read + Send>,
        path: impl Into<PathBuf>,
        options: &CsvOptions,
    ) -> Result<Self, ReaderError> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(options.has_headers)
            .delimiter(options.delimiter)
            .flexible(true)
            .trim(if options.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            })
            .from_reader(source);

        let headers = if options.has_headers {
            let headers = reader
                .headers()
                .map_err(reader_error)?
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<String>>();
            Some(headers)
        } else {
            options.column_names.clone()
        };

        tracing::debug!(
            "Opened CSV {} with headers {:?}",
            path.display(),
            headers.as_deref().unwrap_or_default()
        );

        Ok(Self {
            reader,
            headers,
            record: csv::StringRecord::new(),
            path,
        })
    }
}

fn reader_error(err: csv::Error) -> ReaderError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => ReaderError::Io(e),
        _ => ReaderError::Malformed { line, message },
    }
}

impl RecordReader for CsvReader {
    fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    fn read_record(&mut self) -> Result<Option<RawRecord>, ReaderError> {
        if !self
            .reader
            .read_record(&mut self.record)
            .map_err(reader_error)?
        {
            return Ok(None);
        }

        // Without a header row or configured names, the first record fixes
        // the column count.
        let headers = self.headers.get_or_insert_with(|| {
            (0..self.record.len())
                .map(|i| format!("column_{i}"))
                .collect()
        });

        let record = self
            .record
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let key = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{i}"));
                (key, Value::String(cell.to_string()))
            })
            .collect();
        Ok(Some(record))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn reader(data: &str, options: &CsvOptions) -> CsvReader {
        CsvReader::from_reader(
            Box::new(Cursor::new(data.as_bytes().to_vec())),
            "inline.csv",
            options,
        )
        .unwrap()
    }

    fn read_all(reader: &mut CsvReader) -> Vec<RawRecord> {
        let mut records = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            records.push(record);
        }
        records
    }

    #[test]
    fn test_options_default() {
        let options = CsvOptions::default();
        assert!(options.has_headers);
        assert_eq!(options.delimiter, b',');
        assert!(options.column_names.is_none());
    }

    #[test]
    fn test_header_row_is_consumed() {
        let mut r = reader("name,age\nalice,25\nbob,30\n", &CsvOptions::default());
        assert_eq!(
            r.headers().unwrap(),
            &["name".to_string(), "age".to_string()]
        );
        let records = read_all(&mut r);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], Value::String("alice".into()));
        assert_eq!(records[1]["age"], Value::String("30".into()));
    }

    #[test]
    fn test_generated_column_names() {
        let options = CsvOptions {
            has_headers: false,
            ..CsvOptions::default()
        };
        let mut r = reader("alice,25\nbob,30\n", &options);
        assert!(r.headers().is_none());
        let records = read_all(&mut r);
        assert_eq!(records[0]["column_0"], Value::String("alice".into()));
        assert_eq!(records[1]["column_1"], Value::String("30".into()));
        assert_eq!(
            r.headers().unwrap(),
            &["column_0".to_string(), "column_1".to_string()]
        );
    }

    #[test]
    fn test_configured_column_names() {
        let options = CsvOptions {
            has_headers: false,
            delimiter: b';',
            column_names: Some(vec!["name".into(), "age".into()]),
            trim: true,
        };
        let mut r = reader("alice ; 25\n", &options);
        let records = read_all(&mut r);
        assert_eq!(records[0]["name"], Value::String("alice".into()));
        assert_eq!(records[0]["age"], Value::String("25".into()));
    }

    #[test]
    fn test_ragged_rows() {
        let mut r = reader("a,b\n1\n1,2,3\n", &CsvOptions::default());
        let records = read_all(&mut r);
        assert_eq!(records[0].len(), 1);
        assert!(!records[0].contains_key("b"));
        assert_eq!(records[1]["column_2"], Value::String("3".into()));
    }

    #[test]
    fn test_open_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "id,name").unwrap();
        writeln!(temp_file, "1,Alice").unwrap();
        temp_file.flush().unwrap();

        let mut r = CsvReader::open(temp_file.path(), &CsvOptions::default()).unwrap();
        assert_eq!(r.path(), temp_file.path());
        assert_eq!(read_all(&mut r).len(), 1);
    }

    #[test]
    fn test_open_missing_file() {
        let result = CsvReader::open("/definitely/not/here.csv", &CsvOptions::default());
        assert!(matches!(result, Err(ReaderError::Io(_))));
    }
}
