//! Lookup table for mapped enrichment.

use serde_json::Value;
use std::collections::HashMap;
use sync_core::{is_empty_value, value_to_string, Row};
use tabsync_connector::{ConnectorError, RemoteConnector};

use crate::strategy::MappedLookup;

/// Whether a row is created or updates an existing remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOp {
    Insert,
    Update,
}

/// All remote records of the object, fetched once per run.
///
/// Lookups are memoized per `(reference_field, retrieve_field, value)`;
/// within the fetched order the first match wins.
pub(crate) struct LookupTable {
    records: Vec<Row>,
    cache: HashMap<(String, String, String), Option<Value>>,
    scans: usize,
}

impl LookupTable {
    /// Page through the whole object, leaving the cursor on page 1.
    pub(crate) async fn fetch<C: RemoteConnector>(
        connector: &mut C,
    ) -> Result<Self, ConnectorError> {
        connector.set_page(1);
        let mut records = Vec::new();
        loop {
            let page = connector.get_records(&[]).await?;
            let empty = page.records.is_empty();
            records.extend(page.records);
            if !page.has_more {
                break;
            }
            if empty {
                tracing::warn!(
                    "'{}' returned an empty page that claims more pages; stopping",
                    connector.object()
                );
                break;
            }
        }
        connector.set_page(1);

        tracing::info!(
            "Loaded {} records of '{}' for mapped lookups",
            records.len(),
            connector.object()
        );
        Ok(Self::from_records(records))
    }

    pub(crate) fn from_records(records: Vec<Row>) -> Self {
        Self {
            records,
            cache: HashMap::new(),
            scans: 0,
        }
    }

    pub(crate) fn lookup(
        &mut self,
        reference_field: &str,
        retrieve_field: &str,
        value: &Value,
    ) -> Option<Value> {
        let needle = value_to_string(value);
        let cache_key = (
            reference_field.to_string(),
            retrieve_field.to_string(),
            needle,
        );
        if let Some(hit) = self.cache.get(&cache_key) {
            return hit.clone();
        }

        self.scans += 1;
        let found = self
            .records
            .iter()
            .find(|r| {
                r.get(reference_field)
                    .map(|v| value_to_string(v) == cache_key.2)
                    .unwrap_or(false)
            })
            .and_then(|r| r.get(retrieve_field).cloned());
        self.cache.insert(cache_key, found.clone());
        found
    }

    #[cfg(test)]
    pub(crate) fn scans(&self) -> usize {
        self.scans
    }

    /// Apply mapped fields and key remapping to `row`.
    pub(crate) fn enrich(
        &mut self,
        lookup: &MappedLookup,
        primary_key: Option<&str>,
        row: &mut Row,
    ) -> WriteOp {
        for mapped in &lookup.fields {
            let Some(value) = row.get(&mapped.field).filter(|v| !is_empty_value(v)) else {
                continue;
            };
            let value = value.clone();
            if let Some(found) =
                self.lookup(&mapped.reference_field, &mapped.retrieve_field, &value)
            {
                row.insert(mapped.field.clone(), found);
            }
        }

        let (Some(mapping), Some(pk)) = (&lookup.key_mapping, primary_key) else {
            return WriteOp::Insert;
        };
        let Some(value) = row.get(pk).filter(|v| !is_empty_value(v)).cloned() else {
            return WriteOp::Insert;
        };
        match self.lookup(&mapping.reference_field, &mapping.retrieve_field, &value) {
            Some(remote_key) => {
                row.insert(pk.to_string(), remote_key);
                WriteOp::Update
            }
            None => WriteOp::Insert,
        }
    }
}
