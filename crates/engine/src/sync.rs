//! Delete-missing pass of a sync run.

use serde_json::Value;
use sync_core::{Row, TransactionLog};
use tabsync_connector::{Filter, RemoteConnector};

use crate::error::EngineError;
use crate::import::ImportEngine;
use crate::report::RecordOutcome;
use crate::strategy::{DeleteMissing, DeleteMode};

impl<C: RemoteConnector> ImportEngine<C> {
    /// Delete every remote record tagged with our provenance whose key was not
    /// imported in this run.
    pub(crate) async fn delete_missing(
        &mut self,
        strategy: &DeleteMissing,
        log: &mut dyn TransactionLog,
    ) -> Result<(), EngineError> {
        let batched =
            strategy.mode == DeleteMode::FollowConnector && self.connector.supports_batch();
        let provenance = Filter::eq(
            self.config.source_field.clone(),
            Value::String(self.config.source_value.clone()),
        );
        tracing::info!(
            "Reconciling '{}' against {} imported keys",
            self.connector.object(),
            self.memo.len()
        );

        // No delete is issued until the listing is exhausted
        self.connector.set_page(1);
        let mut candidates: Vec<(String, Row)> = Vec::new();
        let mut scanned = 0u64;
        loop {
            let page = self
                .connector
                .get_records(std::slice::from_ref(&provenance))
                .await?;
            let empty = page.records.is_empty();

            for mut record in page.records {
                scanned += 1;
                let Some(key) = self.model.composite_key(&record) else {
                    tracing::debug!("Skipping remote record without primary key");
                    continue;
                };
                if self.memo.contains(&key) {
                    continue;
                }
                if strategy.exempt.as_ref().is_some_and(|p| p.test(&record)) {
                    tracing::debug!("Keeping exempt record '{}'", key);
                    continue;
                }
                if self.config.dry_run {
                    tracing::info!("Dry run: would delete '{}'", key);
                    continue;
                }

                record.insert(self.config.deletion_marker.clone(), Value::Bool(true));
                candidates.push((key, record));
            }

            if !page.has_more {
                break;
            }
            if empty {
                tracing::warn!(
                    "'{}' returned an empty page that claims more pages; stopping",
                    self.connector.object()
                );
                break;
            }
        }
        self.connector.set_page(1);

        if batched {
            for chunk in candidates.chunks(self.config.batch_size) {
                self.delete_batch(chunk, log).await?;
            }
        } else {
            for (key, record) in &candidates {
                let outcome = self.connector.delete_record(record).await.into();
                self.record_delete(key, record, outcome, log)?;
            }
        }

        tracing::info!(
            "Scanned {} remote records, deleted {} of {} missing",
            scanned,
            self.report.deleted,
            candidates.len()
        );
        Ok(())
    }

    async fn delete_batch(
        &mut self,
        chunk: &[(String, Row)],
        log: &mut dyn TransactionLog,
    ) -> Result<(), EngineError> {
        tracing::debug!(
            "Deleting batch of {} rows from '{}'",
            chunk.len(),
            self.connector.object()
        );
        let rows: Vec<Row> = chunk.iter().map(|(_, row)| row.clone()).collect();
        let mut results = self.connector.delete_records(&rows).await.into_iter();
        for (key, row) in chunk {
            let outcome = match results.next() {
                Some(result) => result.into(),
                None => RecordOutcome::Failure("connector returned no result for row".to_string()),
            };
            self.record_delete(key, row, outcome, log)?;
        }
        Ok(())
    }

    fn record_delete(
        &mut self,
        key: &str,
        row: &Row,
        outcome: RecordOutcome,
        log: &mut dyn TransactionLog,
    ) -> Result<(), EngineError> {
        match outcome {
            RecordOutcome::Success => self.report.deleted += 1,
            RecordOutcome::Failure(reason) => {
                self.report.failed += 1;
                tracing::warn!("Delete of '{}' rejected: {}", key, reason);
                log.log_failure(row, &format!("delete failed for '{key}': {reason}"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::import::{ImportConfig, ImportEngine};
    use crate::strategy::{DeleteMissing, Reconciliation, RowPredicate};
    use crate::testing::{MemoryLog, VecReader};
    use serde_json::json;
    use sync_core::{Field, Model, Row};
    use tabsync_connector::{MemoryConnector, RemoteConnector};

    fn remote(id: &str, source: &str) -> Row {
        [
            ("id".to_string(), json!(id)),
            ("source".to_string(), json!(source)),
        ]
        .into_iter()
        .collect()
    }

    fn sync_config(strategy: DeleteMissing) -> ImportConfig {
        ImportConfig {
            reconciliation: Reconciliation::DeleteMissing(strategy),
            ..ImportConfig::default()
        }
    }

    fn model() -> Model {
        Model::new(vec![Field::primary_key("id")]).unwrap()
    }

    #[tokio::test]
    async fn test_only_own_records_are_deleted() {
        let connector = MemoryConnector::new("items").with_records(vec![
            remote("A", "sdk"),
            remote("B", "sdk"),
            remote("C", "sdk"),
            remote("M", "manual"),
        ]);
        let mut engine =
            ImportEngine::new(connector, model(), sync_config(DeleteMissing::default())).unwrap();
        let mut reader = VecReader::new(&["id"], &[&["A"], &["B"]]);
        let mut log = MemoryLog::default();

        let report = engine.run(&mut reader, &mut log).await.unwrap();
        assert_eq!(report.success, 2);
        assert_eq!(report.deleted, 1);

        let calls = engine.connector().calls();
        assert_eq!(calls.deleted.len(), 1);
        assert_eq!(calls.deleted[0]["id"], json!("C"));
        assert_eq!(calls.deleted[0]["_deleted"], json!(true));
        let ids: Vec<_> = engine.connector().records().iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("A"), json!("B"), json!("M")]);
        assert_eq!(engine.connector().options().page, 1);
    }

    #[tokio::test]
    async fn test_one_by_one_with_exemption() {
        let connector = MemoryConnector::new("items").with_records(vec![
            remote("A", "sdk"),
            remote("keep-1", "sdk"),
            remote("C", "sdk"),
            remote("D", "sdk"),
        ]);
        let exempt = RowPredicate::new(|r| {
            r.get("id")
                .and_then(|v| v.as_str())
                .is_some_and(|id| id.starts_with("keep"))
        });
        let mut engine = ImportEngine::new(
            connector,
            model(),
            sync_config(DeleteMissing::one_by_one(Some(exempt))),
        )
        .unwrap();
        let mut reader = VecReader::new(&["id"], &[&["A"]]);
        let mut log = MemoryLog::default();

        let report = engine.run(&mut reader, &mut log).await.unwrap();
        assert_eq!(report.deleted, 2);
        let calls = engine.connector().calls();
        assert_eq!(calls.delete_record, 2);
        assert!(calls.delete_batches.is_empty());
        assert!(engine
            .connector()
            .records()
            .iter()
            .any(|r| r["id"] == json!("keep-1")));
    }

    #[tokio::test]
    async fn test_failed_delete_is_logged() {
        let connector = MemoryConnector::new("items")
            .with_records(vec![remote("A", "sdk"), remote("B", "sdk")])
            .fail_on("B", "locked");
        let mut engine =
            ImportEngine::new(connector, model(), sync_config(DeleteMissing::default())).unwrap();
        let mut reader = VecReader::new(&["id"], &[&["A"]]);
        let mut log = MemoryLog::default();

        let report = engine.run(&mut reader, &mut log).await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(log.failures.len(), 1);
        assert_eq!(log.failures[0].1, "delete failed for 'B': locked");
    }

    fn live_remote() -> MemoryConnector {
        let mut records = vec![remote("A", "sdk")];
        records.extend((1..=6).map(|i| remote(&format!("C{i}"), "sdk")));
        MemoryConnector::new("items")
            .with_records(records)
            .with_page_size(2)
            .with_live_paging(true)
    }

    #[tokio::test]
    async fn test_live_listing_one_by_one_deletes_every_missing_record() {
        let mut engine = ImportEngine::new(
            live_remote(),
            model(),
            sync_config(DeleteMissing::one_by_one(None)),
        )
        .unwrap();
        let mut reader = VecReader::new(&["id"], &[&["A"]]);
        let mut log = MemoryLog::default();

        let report = engine.run(&mut reader, &mut log).await.unwrap();

        assert_eq!(report.deleted, 6);
        assert_eq!(engine.connector().calls().delete_record, 6);
        let ids: Vec<_> = engine.connector().records().iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("A")]);
    }

    #[tokio::test]
    async fn test_live_listing_batched_deletes_every_missing_record() {
        let config = ImportConfig {
            batch_size: 4,
            ..sync_config(DeleteMissing::default())
        };
        let mut engine = ImportEngine::new(live_remote(), model(), config).unwrap();
        let mut reader = VecReader::new(&["id"], &[&["A"]]);
        let mut log = MemoryLog::default();

        let report = engine.run(&mut reader, &mut log).await.unwrap();

        assert_eq!(report.deleted, 6);
        assert_eq!(engine.connector().calls().delete_batches, vec![4, 2]);
        assert_eq!(engine.connector().records().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_requires_primary_key() {
        let model = Model::new(vec![Field::new("name")]).unwrap();
        let connector = MemoryConnector::new("items");
        let result = ImportEngine::new(connector, model, sync_config(DeleteMissing::default()));
        assert!(result.is_err());
    }
}
