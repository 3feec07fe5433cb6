//! In-memory connector.
//!
//! Keeps an ordered list of records keyed by the primary key field. Listings
//! are snapshotted when page 1 is requested so that deletes issued while
//! paging do not shift later pages. With live paging every page is cut from
//! the current store, the way a plain REST listing behaves.

use crate::query::compare;
use crate::{
    ActivitySummary, ConnectorError, Filter, Page, QueryOptions, RemoteConnector, Structure,
};
use std::collections::HashMap;
use sync_core::{is_empty_value, value_to_string, Row};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Calls received by a [`MemoryConnector`].
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub get_records: usize,
    pub get_structure: usize,
    pub insert_record: usize,
    pub update_record: usize,
    pub delete_record: usize,
    /// Size of every `insert_records` call, in call order
    pub insert_batches: Vec<usize>,
    /// Size of every `delete_records` call, in call order
    pub delete_batches: Vec<usize>,
    /// Rows successfully inserted, updated or deleted
    pub inserted: Vec<Row>,
    pub updated: Vec<Row>,
    pub deleted: Vec<Row>,
    /// Stored plus extra filters of the last `get_records` call
    pub last_filters: Vec<Filter>,
    pub activities: Vec<ActivitySummary>,
}

/// Connector backed by a `Vec<Row>`.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    object: String,
    records: Vec<Row>,
    page_size: usize,
    batch: bool,
    structure: Structure,
    options: QueryOptions,
    has_more: bool,
    primary_key: Option<String>,
    snapshot: Vec<Row>,
    live_paging: bool,
    failures: HashMap<String, String>,
    fail_activity: bool,
    calls: CallLog,
}

impl MemoryConnector {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            records: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            batch: true,
            structure: Structure::default(),
            options: QueryOptions::default(),
            has_more: true,
            primary_key: None,
            snapshot: Vec::new(),
            live_paging: false,
            failures: HashMap::new(),
            fail_activity: false,
            calls: CallLog::default(),
        }
    }

    pub fn with_records(mut self, records: Vec<Row>) -> Self {
        self.records = records;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Compute every page from the live store instead of a page-1 snapshot.
    pub fn with_live_paging(mut self, live: bool) -> Self {
        self.live_paging = live;
        self
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = structure;
        self
    }

    /// Reject every write whose primary key value is `key`.
    pub fn fail_on(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(key.into(), message.into());
        self
    }

    pub fn fail_activity(mut self) -> Self {
        self.fail_activity = true;
        self
    }

    pub fn records(&self) -> &[Row] {
        &self.records
    }

    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    fn key_of(&self, row: &Row) -> Option<String> {
        let field = self.primary_key.as_deref()?;
        row.get(field)
            .filter(|v| !is_empty_value(v))
            .map(value_to_string)
    }

    fn require_key(&self, row: &Row) -> Result<String, ConnectorError> {
        let field = self
            .primary_key
            .as_deref()
            .ok_or_else(|| ConnectorError::NoPrimaryKey(self.object.clone()))?;
        self.key_of(row)
            .ok_or_else(|| ConnectorError::MissingKey(field.to_string()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| self.key_of(r).as_deref() == Some(key))
    }

    fn check_injected(&self, row: &Row) -> Result<(), ConnectorError> {
        match self.key_of(row).and_then(|k| self.failures.get(&k)) {
            Some(message) => Err(ConnectorError::Rejected(message.clone())),
            None => Ok(()),
        }
    }

    fn upsert(&mut self, row: &Row) -> Result<(), ConnectorError> {
        self.check_injected(row)?;
        match self.key_of(row).and_then(|k| self.position(&k)) {
            Some(index) => self.records[index] = row.clone(),
            None => self.records.push(row.clone()),
        }
        self.calls.inserted.push(row.clone());
        Ok(())
    }

    fn remove(&mut self, row: &Row) -> Result<(), ConnectorError> {
        self.check_injected(row)?;
        let key = self.require_key(row)?;
        let index = self
            .position(&key)
            .ok_or_else(|| ConnectorError::NotFound(key.clone()))?;
        self.records.remove(index);
        self.calls.deleted.push(row.clone());
        Ok(())
    }

    fn take_snapshot(&mut self, filters: &[Filter]) {
        let mut listing: Vec<Row> = self
            .records
            .iter()
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .cloned()
            .collect();
        if let Some(order) = &self.options.order {
            let null = serde_json::Value::Null;
            listing.sort_by(|a, b| {
                let ordering = compare(
                    a.get(&order.field).unwrap_or(&null),
                    b.get(&order.field).unwrap_or(&null),
                );
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        self.snapshot = listing;
    }
}

#[async_trait::async_trait]
impl RemoteConnector for MemoryConnector {
    fn object(&self) -> &str {
        &self.object
    }

    fn options(&self) -> &QueryOptions {
        &self.options
    }

    fn set_options(&mut self, options: QueryOptions) {
        self.options = options;
        self.has_more = true;
    }

    fn has_more(&self) -> bool {
        self.has_more
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }

    fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    fn set_primary_key(&mut self, field: Option<String>) {
        self.primary_key = field;
    }

    async fn get_records(&mut self, extra: &[Filter]) -> Result<Page, ConnectorError> {
        self.calls.get_records += 1;
        let filters: Vec<Filter> = self.options.filters.iter().chain(extra).cloned().collect();
        let page = self.options.page.max(1) as usize;
        if page == 1 || self.live_paging {
            self.take_snapshot(&filters);
        }
        self.calls.last_filters = filters;

        let per_page = self
            .options
            .per_page
            .map(|n| n.max(1) as usize)
            .unwrap_or(self.page_size);
        let total_pages = self.snapshot.len().div_ceil(per_page).max(1);
        let records = self
            .snapshot
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        self.has_more = page < total_pages;
        self.options.page = self.options.page.saturating_add(1);
        Ok(Page {
            records,
            has_more: self.has_more,
        })
    }

    async fn get_structure(&mut self) -> Result<Structure, ConnectorError> {
        self.calls.get_structure += 1;
        Ok(self.structure.clone())
    }

    async fn insert_record(&mut self, row: &Row) -> Result<(), ConnectorError> {
        self.calls.insert_record += 1;
        self.upsert(row)
    }

    async fn insert_records(&mut self, rows: &[Row]) -> Vec<Result<(), ConnectorError>> {
        self.calls.insert_batches.push(rows.len());
        rows.iter().map(|row| self.upsert(row)).collect()
    }

    async fn update_record(&mut self, row: &Row) -> Result<(), ConnectorError> {
        self.calls.update_record += 1;
        self.check_injected(row)?;
        let key = self.require_key(row)?;
        let index = self
            .position(&key)
            .ok_or_else(|| ConnectorError::NotFound(key.clone()))?;
        for (field, value) in row {
            self.records[index].insert(field.clone(), value.clone());
        }
        self.calls.updated.push(row.clone());
        Ok(())
    }

    async fn delete_record(&mut self, row: &Row) -> Result<(), ConnectorError> {
        self.calls.delete_record += 1;
        self.remove(row)
    }

    async fn delete_records(&mut self, rows: &[Row]) -> Vec<Result<(), ConnectorError>> {
        self.calls.delete_batches.push(rows.len());
        rows.iter().map(|row| self.remove(row)).collect()
    }

    async fn insert_activity_record(
        &mut self,
        summary: &ActivitySummary,
    ) -> Result<(), ConnectorError> {
        if self.fail_activity {
            return Err(ConnectorError::Rejected("activity endpoint unavailable".into()));
        }
        self.calls.activities.push(summary.clone());
        Ok(())
    }
}
