//! RemoteConnector trait definition.

use crate::{ActivitySummary, ConnectorError, Filter, Page, QueryOptions, Structure};
use sync_core::Row;

/// Trait for a paginated, authenticated remote object.
///
/// Methods take `&mut self` because a connector owns the session state of a
/// single run: the page cursor, the `has_more` flag and the memoized
/// structure. Engines are generic over this trait:
///
/// ```ignore
/// pub async fn run<C: RemoteConnector>(connector: &mut C) -> Result<(), ConnectorError> {
///     loop {
///         let page = connector.get_records(&[]).await?;
///         // ...
///         if !page.has_more {
///             break;
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait RemoteConnector: Send {
    /// Name of the remote object (table, endpoint) this connector addresses.
    fn object(&self) -> &str;

    fn options(&self) -> &QueryOptions;

    /// Replace the query options. This is the only way the page cursor moves
    /// backwards.
    fn set_options(&mut self, options: QueryOptions);

    fn set_page(&mut self, page: u32) {
        let mut options = self.options().clone();
        options.page = page;
        self.set_options(options);
    }

    /// Whether the last fetched page was followed by another one.
    fn has_more(&self) -> bool;

    /// Whether batched insert/delete calls should be used.
    fn supports_batch(&self) -> bool;

    fn primary_key(&self) -> Option<&str>;

    fn set_primary_key(&mut self, field: Option<String>);

    /// Fetch the current page, applying the stored options plus `extra`
    /// filters, then advance the cursor.
    async fn get_records(&mut self, extra: &[Filter]) -> Result<Page, ConnectorError>;

    /// Field name to type map of the remote object, fetched once per session.
    async fn get_structure(&mut self) -> Result<Structure, ConnectorError>;

    /// Insert or update by natural key.
    async fn insert_record(&mut self, row: &Row) -> Result<(), ConnectorError>;

    /// Batched insert. One result per input row, in input order.
    async fn insert_records(&mut self, rows: &[Row]) -> Vec<Result<(), ConnectorError>>;

    async fn update_record(&mut self, row: &Row) -> Result<(), ConnectorError>;

    async fn delete_record(&mut self, row: &Row) -> Result<(), ConnectorError>;

    /// Batched delete. One result per input row, in input order.
    async fn delete_records(&mut self, rows: &[Row]) -> Vec<Result<(), ConnectorError>>;

    /// Send a run summary. Callers treat failure as non-fatal.
    async fn insert_activity_record(
        &mut self,
        summary: &ActivitySummary,
    ) -> Result<(), ConnectorError>;
}
