//! Import engine
//!
//! Reads raw records, maps them through the [`Model`], drops duplicates and
//! sends the rest to the connector, either one by one or in batches of
//! `batch_size` (the last record of the input always flushes the queue).
//! Every record ends up in the success or the failure log.
//!
//! With [`Reconciliation::DeleteMissing`] the run continues with a sync pass
//! that deletes remote records absent from the input.

use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Instant;
use sync_core::{ConfigError, Model, RawRecord, RecordReader, Row, TransactionLog};
use tabsync_connector::{ActivitySummary, RemoteConnector, RunKind};

use crate::error::EngineError;
use crate::mapped::{LookupTable, WriteOp};
use crate::memo::Memo;
use crate::report::{ImportReport, RecordOutcome};
use crate::strategy::{Enrichment, Reconciliation};

/// Rows per batched insert/delete call
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Failure reason of a record whose key was already imported in this run
pub const DUPLICATE_KEY_REASON: &str = "duplicate primary key";

/// Configuration for an import run
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Queue length that triggers a batched call
    pub batch_size: usize,

    /// Provenance field injected into every row; the sync pass only
    /// considers remote records carrying it
    pub source_field: String,

    /// Provenance value (default: "sdk")
    pub source_value: String,

    /// Field receiving the unix time of the import, if any
    pub synced_at_field: Option<String>,

    /// Check model keys against the remote structure before importing
    pub validate_structure: bool,

    /// Map, dedupe and log without writing to the connector
    pub dry_run: bool,

    /// Send an activity summary at the end of the run
    pub activity: bool,

    /// Field set to `true` on records about to be deleted
    pub deletion_marker: String,

    pub reconciliation: Reconciliation,

    pub enrichment: Enrichment,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            source_field: "source".to_string(),
            source_value: "sdk".to_string(),
            synced_at_field: Some("synced_at".to_string()),
            validate_structure: true,
            dry_run: false,
            activity: true,
            deletion_marker: "_deleted".to_string(),
            reconciliation: Reconciliation::None,
            enrichment: Enrichment::None,
        }
    }
}

/// A mapped row waiting for a batched insert.
struct Pending {
    raw: RawRecord,
    row: Row,
    key: Option<String>,
}

/// Drives one import (or sync) run against a connector it owns.
pub struct ImportEngine<C: RemoteConnector> {
    pub(crate) connector: C,
    pub(crate) model: Model,
    pub(crate) config: ImportConfig,
    pub(crate) memo: Memo,
    pub(crate) report: ImportReport,
    queue: Vec<Pending>,
    lookup: Option<LookupTable>,
}

impl<C: RemoteConnector> ImportEngine<C> {
    pub fn new(mut connector: C, model: Model, config: ImportConfig) -> Result<Self, EngineError> {
        if config.batch_size == 0 {
            return Err(ConfigError::Invalid("batch size must be at least 1".to_string()).into());
        }
        if matches!(config.reconciliation, Reconciliation::DeleteMissing(_))
            && model.primary_key().is_none()
        {
            return Err(ConfigError::SyncWithoutPrimaryKey.into());
        }
        if let Enrichment::Mapped(lookup) = &config.enrichment {
            if lookup.key_mapping.is_some() && model.primary_key().is_none() {
                return Err(ConfigError::Invalid(
                    "key mapping requires a primary key field".to_string(),
                )
                .into());
            }
        }

        connector.set_primary_key(model.primary_key().map(str::to_string));
        Ok(Self {
            connector,
            model,
            config,
            memo: Memo::new(),
            report: ImportReport::default(),
            queue: Vec::new(),
            lookup: None,
        })
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_connector(self) -> C {
        self.connector
    }

    /// Import every record of `reader`, then reconcile if configured.
    pub async fn run(
        &mut self,
        reader: &mut dyn RecordReader,
        log: &mut dyn TransactionLog,
    ) -> Result<ImportReport, EngineError> {
        let started = Instant::now();
        let kind = match self.config.reconciliation {
            Reconciliation::None => RunKind::Import,
            Reconciliation::DeleteMissing(_) => RunKind::Sync,
        };
        let source_name = reader.path().display().to_string();
        tracing::info!(
            "Starting {} of {} into '{}'{}",
            kind,
            source_name,
            self.connector.object(),
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        self.memo = Memo::new();
        self.report = ImportReport::default();
        self.queue.clear();
        self.setup().await?;

        let mut validated = match reader.headers() {
            Some(headers) => {
                self.validate_input(&source_name, headers.iter())?;
                true
            }
            None => false,
        };

        let mut next = reader.read_record()?;
        while let Some(raw) = next.take() {
            if !validated {
                // Header-less input: the first record fixes the columns.
                let columns: Vec<String> = match reader.headers() {
                    Some(headers) => headers.to_vec(),
                    None => raw.keys().cloned().collect(),
                };
                self.validate_input(&source_name, columns.iter())?;
                validated = true;
            }
            next = reader.read_record()?;
            let is_last = next.is_none();
            self.process(raw, log).await?;
            if self.queue.len() >= self.config.batch_size || (is_last && !self.queue.is_empty()) {
                self.flush(log).await?;
            }
        }

        if let Reconciliation::DeleteMissing(strategy) = self.config.reconciliation.clone() {
            self.delete_missing(&strategy, log).await?;
        }

        self.report.duration = started.elapsed();
        tracing::info!(
            "Finished {} of {}: {} succeeded, {} failed, {} deleted in {:.2}s",
            kind,
            source_name,
            self.report.success,
            self.report.failed,
            self.report.deleted,
            self.report.duration.as_secs_f64()
        );

        if self.config.activity && !self.config.dry_run {
            self.send_activity(kind, &source_name).await;
        }
        Ok(self.report.clone())
    }

    /// Structure validation and lookup prefetch. Connector failures here are
    /// fatal.
    async fn setup(&mut self) -> Result<(), EngineError> {
        if self.config.validate_structure {
            let structure = self.connector.get_structure().await?;
            if structure.is_empty() {
                tracing::debug!(
                    "'{}' reported no structure; skipping field validation",
                    self.connector.object()
                );
            } else {
                let unknown: Vec<String> = self
                    .model
                    .keys()
                    .into_iter()
                    .filter(|key| !structure.has_field(key))
                    .collect();
                if !unknown.is_empty() {
                    return Err(ConfigError::UnknownRemoteFields {
                        object: self.connector.object().to_string(),
                        fields: unknown,
                    }
                    .into());
                }
            }
        }

        self.lookup = match &self.config.enrichment {
            Enrichment::Mapped(_) => Some(LookupTable::fetch(&mut self.connector).await?),
            Enrichment::None => None,
        };
        Ok(())
    }

    fn validate_input<'a>(
        &self,
        source_name: &str,
        columns: impl Iterator<Item = &'a String>,
    ) -> Result<(), EngineError> {
        let available: BTreeSet<&str> = columns.map(String::as_str).collect();
        let missing: Vec<String> = self
            .model
            .referenced_fields()
            .into_iter()
            .filter(|f| !available.contains(f.as_str()))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingInputFields {
                source_name: source_name.to_string(),
                fields: missing,
            }
            .into())
        }
    }

    /// Map, enrich, dedupe and send (or queue) one record.
    async fn process(
        &mut self,
        raw: RawRecord,
        log: &mut dyn TransactionLog,
    ) -> Result<(), EngineError> {
        let mut row = match self.model.fill(&raw) {
            Ok(row) => row,
            Err(e) => {
                return self.record_outcome(&raw, None, RecordOutcome::Failure(e.to_string()), log)
            }
        };

        let op = match (&self.config.enrichment, self.lookup.as_mut()) {
            (Enrichment::Mapped(mapped), Some(table)) => {
                table.enrich(mapped, self.model.primary_key(), &mut row)
            }
            _ => WriteOp::Insert,
        };

        row.insert(
            self.config.source_field.clone(),
            Value::String(self.config.source_value.clone()),
        );
        if let Some(field) = &self.config.synced_at_field {
            row.insert(field.clone(), Value::from(chrono::Utc::now().timestamp()));
        }

        let key = self.model.composite_key(&row);
        if let Some(key) = &key {
            let queued = self.queue.iter().any(|p| p.key.as_ref() == Some(key));
            if queued || self.memo.contains(key) {
                return self.record_outcome(
                    &raw,
                    None,
                    RecordOutcome::Failure(DUPLICATE_KEY_REASON.to_string()),
                    log,
                );
            }
        }

        if self.config.dry_run {
            return self.record_outcome(&raw, key, RecordOutcome::Success, log);
        }

        if op == WriteOp::Update {
            let outcome = self.connector.update_record(&row).await.into();
            return self.record_outcome(&raw, key, outcome, log);
        }

        if self.connector.supports_batch() {
            self.queue.push(Pending { raw, row, key });
            Ok(())
        } else {
            let outcome = self.connector.insert_record(&row).await.into();
            self.record_outcome(&raw, key, outcome, log)
        }
    }

    /// Send the queued rows in one batched call and route each result.
    async fn flush(&mut self, log: &mut dyn TransactionLog) -> Result<(), EngineError> {
        let pending = std::mem::take(&mut self.queue);
        let rows: Vec<Row> = pending.iter().map(|p| p.row.clone()).collect();
        tracing::debug!(
            "Flushing batch of {} rows to '{}'",
            rows.len(),
            self.connector.object()
        );

        let mut results = self.connector.insert_records(&rows).await.into_iter();
        for item in pending {
            let outcome = match results.next() {
                Some(result) => result.into(),
                None => RecordOutcome::Failure("connector returned no result for row".to_string()),
            };
            self.record_outcome(&item.raw, item.key, outcome, log)?;
        }
        Ok(())
    }

    /// Count the outcome, remember successful keys and write the log entry.
    fn record_outcome(
        &mut self,
        raw: &RawRecord,
        key: Option<String>,
        outcome: RecordOutcome,
        log: &mut dyn TransactionLog,
    ) -> Result<(), EngineError> {
        match outcome {
            RecordOutcome::Success => {
                self.report.success += 1;
                if let Some(key) = key {
                    self.memo.insert(key);
                }
                log.log_success(raw)?;
            }
            RecordOutcome::Failure(reason) => {
                self.report.failed += 1;
                tracing::warn!("Record rejected: {}", reason);
                log.log_failure(raw, &reason)?;
            }
        }
        Ok(())
    }

    async fn send_activity(&mut self, kind: RunKind, source_name: &str) {
        let summary = ActivitySummary {
            run_id: uuid::Uuid::new_v4().to_string(),
            kind,
            object: self.connector.object().to_string(),
            file: source_name.to_string(),
            success: self.report.success,
            failed: self.report.failed,
            deleted: self.report.deleted,
            duration_secs: self.report.duration.as_secs_f64(),
            message: format!(
                "{kind} of {source_name}: {} succeeded, {} failed, {} deleted",
                self.report.success, self.report.failed, self.report.deleted
            ),
            finished_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self.connector.insert_activity_record(&summary).await {
            tracing::error!("Failed to record activity for {}: {}", source_name, e);
        }
    }
}
