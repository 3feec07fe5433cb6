//! Run history for incremental exports
//!
//! Keeps the unix timestamp of the last successful run per key (usually the
//! base name of the exported file). An incremental export reads the value
//! before fetching and stamps "now" once the run succeeded.
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - a single JSON object file, rewritten atomically
//! - `MemoryStore` - process-local map, for tests and one-shot runs

mod filesystem;
mod memory;
pub mod store;


pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use store::{HistoryStore, RunHistory};
