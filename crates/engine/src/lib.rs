//! Import, sync and export engines.
//!
//! An [`ImportEngine`] moves records from a [`sync_core::RecordReader`] to a
//! [`tabsync_connector::RemoteConnector`]; with
//! [`Reconciliation::DeleteMissing`] it also deletes remote records that the
//! input no longer contains. An [`ExportEngine`] moves records the other way,
//! into a [`sync_core::RecordWriter`].
//!
//! Both engines own their connector for the duration of a run and process
//! records sequentially; only the connector's batch calls fan out.

pub mod error;
pub mod export;
pub mod import;
mod mapped;
pub mod memo;
pub mod report;
pub mod strategy;
mod sync;
pub mod testing;

pub use error::EngineError;
pub use export::{ExportConfig, ExportEngine};
pub use import::{ImportConfig, ImportEngine, DEFAULT_BATCH_SIZE, DUPLICATE_KEY_REASON};
pub use memo::Memo;
pub use report::{ExportReport, ImportReport, RecordOutcome};
pub use strategy::{
    DeleteMissing, DeleteMode, Enrichment, KeyMapping, MappedField, MappedLookup,
    Reconciliation, RowPredicate,
};
