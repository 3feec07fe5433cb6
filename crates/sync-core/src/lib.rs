//! Core types for the tabsync framework.
//!
//! This crate provides the mapping layer shared by every import and export
//! run:
//!
//! - [`Transform`] - Single-value functions applied after alias resolution
//! - [`Alias`] - Resolves one output value from a raw input record
//! - [`Field`] - Binds an output key, a [`FieldKind`], an alias and transforms
//! - [`Model`] - Ordered collection of fields that turns raw records into rows
//! - [`RecordReader`], [`RecordWriter`], [`TransactionLog`] - I/O contracts
//!   implemented by the CSV crate and consumed by the engines
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── tabsync-csv        (implements RecordReader / RecordWriter / TransactionLog)
//!    ├─── tabsync-connector  (moves Rows to and from the remote API)
//!    └─── tabsync-engine     (drives Model + connector + I/O)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{Alias, Field, Model, RawRecord, Transform};
//! use serde_json::json;
//!
//! let model = Model::new(vec![
//!     Field::primary_key("email").with_transform(Transform::Lowercase),
//!     Field::new("full_name").with_alias(Alias::formatted("%first% %last%")),
//! ])
//! .unwrap();
//!
//! let mut record = RawRecord::new();
//! record.insert("email".into(), json!("JO@EXAMPLE.COM"));
//! record.insert("first".into(), json!("Jo"));
//! record.insert("last".into(), json!("Doe"));
//!
//! let row = model.fill(&record).unwrap();
//! assert_eq!(row["email"], json!("jo@example.com"));
//! assert_eq!(row["full_name"], json!("Jo Doe"));
//! ```

pub mod alias;
pub mod error;
pub mod field;
pub mod io;
pub mod model;
pub mod transform;
pub mod values;

// Re-exports for convenience
pub use alias::{Alias, RecordFn};
pub use error::{ConfigError, MappingError};
pub use field::{Field, FieldKind};
pub use io::{LogError, ReaderError, RecordReader, RecordWriter, TransactionLog, WriterError};
pub use model::Model;
pub use transform::{Transform, ValueFn};
pub use values::{is_empty_value, value_to_string, RawRecord, Row};
