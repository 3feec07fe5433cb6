//! tabsync Library
//!
//! Moves tabular records between CSV files and a paginated REST API.
//!
//! # Features
//!
//! - Import: CSV records mapped through a field model and sent in batches
//! - Sync: import, then delete remote records the file no longer contains
//! - Export: remote records written to CSV, optionally incremental and
//!   forwarded to a local directory, S3 or an HTTP endpoint
//!
//! # Crates
//!
//! - `sync_core` - fields, aliases, transforms and the record model
//! - `tabsync_connector` - remote connector contract and REST connector
//! - `tabsync_csv` - CSV reader, writer and transaction log
//! - `tabsync_file` - file locations and transports
//! - `checkpoint` - run history for incremental exports
//! - `tabsync_engine` - import, sync and export engines
//!
//! # CLI Usage
//!
//! ```bash
//! tabsync import --job contacts.yaml --dry-run
//! tabsync sync --job contacts.yaml
//! tabsync export --job contacts.yaml --incremental
//! ```

pub mod config;
pub mod job;

pub use config::JobConfig;
pub use job::{run_export, run_import, RunOptions};
