//! CSV implementations of the record contracts
//!
//! - [`CsvReader`] reads raw records, keyed by header name (or `column_{i}`
//!   when the file has no header and no column names are configured)
//! - [`CsvWriter`] writes export rows, optionally appending
//! - [`CsvTransactionLog`] writes the per-record success and failure files of
//!   an import next to the input

mod log;
mod reader;
mod writer;

pub use log::{log_file_name, CsvTransactionLog, LogKind};
pub use reader::{CsvOptions, CsvReader};
pub use writer::CsvWriter;

