//! Remote connector abstraction.
//!
//! This crate defines the `RemoteConnector` trait that the import and export
//! engines drive, plus two implementations:
//!
//! - [`RestConnector`] - paginated JSON API over HTTP (reqwest)
//! - [`MemoryConnector`] - in-process store used for tests and dry runs
//!
//! A connector instance owns the session state of one run: the page cursor,
//! the "has more pages" flag, the query options and the memoized structure.

mod activity;
mod error;
mod memory;
mod query;
mod rest;
mod structure;
mod traits;

pub use activity::{ActivitySummary, RunKind};
pub use error::ConnectorError;
pub use memory::{CallLog, MemoryConnector};
pub use query::{Filter, FilterOp, Order, Page, QueryOptions};
pub use rest::{RestConfig, RestConnector, DEFAULT_CONCURRENCY};
pub use structure::Structure;
pub use traits::RemoteConnector;
