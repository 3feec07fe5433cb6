//! Reconciliation and enrichment strategies of an import run.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sync_core::Row;

/// Predicate over a remote record.
#[derive(Clone)]
pub struct RowPredicate(Arc<dyn Fn(&Row) -> bool + Send + Sync>);

impl RowPredicate {
    pub fn new(f: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn test(&self, row: &Row) -> bool {
        (self.0)(row)
    }
}

impl std::fmt::Debug for RowPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RowPredicate(..)")
    }
}

/// What happens to remote records after the input has been imported.
#[derive(Debug, Clone, Default)]
pub enum Reconciliation {
    /// Plain import
    #[default]
    None,
    /// Delete remote records created by this tool that the input no longer has
    DeleteMissing(DeleteMissing),
}

/// How deletions are sent to the connector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Batched when the connector supports it
    #[default]
    FollowConnector,
    /// Always one `delete_record` call per record
    OneByOne,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteMissing {
    pub mode: DeleteMode,
    /// Records for which this returns true are never deleted
    pub exempt: Option<RowPredicate>,
}

impl DeleteMissing {
    /// Delete-missing as used together with mapped lookups: one call per
    /// record, with an optional exemption.
    pub fn one_by_one(exempt: Option<RowPredicate>) -> Self {
        Self {
            mode: DeleteMode::OneByOne,
            exempt,
        }
    }
}

/// How rows are enriched from remote data before they are sent.
#[derive(Debug, Clone, Default)]
pub enum Enrichment {
    #[default]
    None,
    Mapped(MappedLookup),
}

/// Replace `field` with `retrieve_field` of the first remote record whose
/// `reference_field` equals the row's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedField {
    pub field: String,
    pub reference_field: String,
    pub retrieve_field: String,
}

/// Primary-key remapping: a match turns the insert into an update of the
/// matched remote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMapping {
    pub reference_field: String,
    pub retrieve_field: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedLookup {
    #[serde(default)]
    pub fields: Vec<MappedField>,
    #[serde(default)]
    pub key_mapping: Option<KeyMapping>,
}
