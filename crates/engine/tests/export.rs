//! Export runs against the in-memory connector.

use async_trait::async_trait;
use checkpoint::{HistoryStore, MemoryStore};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use sync_core::{Alias, Field, Model, Row};
use tabsync_connector::{MemoryConnector, RunKind, Structure};
use tabsync_engine::testing::VecWriter;
use tabsync_engine::{EngineError, ExportConfig, ExportEngine};
use tabsync_file::{FileLocation, FileTransport, LocalTransport};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn contacts(n: i64) -> Vec<Row> {
    (1..=n)
        .map(|i| {
            row(&[
                ("id", json!(i)),
                ("email", json!(format!("user{i}@example.com"))),
                ("sys_creation_date", json!(1_700_000_000 + i * 100)),
            ])
        })
        .collect()
}

fn model() -> Model {
    Model::new(vec![Field::primary_key("id"), Field::new("email")]).unwrap()
}

#[tokio::test]
async fn test_export_writes_header_then_rows_across_pages() {
    let connector = MemoryConnector::new("contacts")
        .with_records(contacts(5))
        .with_page_size(2);
    let mut engine = ExportEngine::new(connector, model(), ExportConfig::default());
    let mut writer = VecWriter::new("contacts.csv");

    let report = engine.run(&mut writer).await.unwrap();

    assert_eq!(report.written, 5);
    assert_eq!(report.pages, 3);
    assert_eq!(writer.rows.len(), 6);
    assert_eq!(writer.rows[0], vec!["id", "email"]);
    assert_eq!(writer.rows[1], vec!["1", "user1@example.com"]);
    assert_eq!(writer.rows[5], vec!["5", "user5@example.com"]);

    let activity = &engine.connector().calls().activities[0];
    assert_eq!(activity.kind, RunKind::Export);
    assert_eq!(activity.success, 5);
}

#[tokio::test]
async fn test_appending_writer_gets_no_header() {
    let connector = MemoryConnector::new("contacts").with_records(contacts(1));
    let mut engine = ExportEngine::new(connector, model(), ExportConfig::default());
    let mut writer = VecWriter::new("contacts.csv").appending();

    engine.run(&mut writer).await.unwrap();
    assert_eq!(writer.rows, vec![vec!["1", "user1@example.com"]]);
}

#[tokio::test]
async fn test_incremental_export_filters_and_stamps() {
    let history = Arc::new(MemoryStore::new());
    let structure = Structure::new([
        ("id", "integer"),
        ("email", "string"),
        ("sys_creation_date", "timestamp"),
    ]);
    let config = ExportConfig {
        incremental: true,
        ..ExportConfig::default()
    };

    // First run exports everything and stamps the history
    let connector = MemoryConnector::new("contacts")
        .with_records(contacts(4))
        .with_structure(structure.clone());
    let mut engine = ExportEngine::new(connector, model(), config.clone())
        .with_history(history.clone() as Arc<dyn HistoryStore>);
    let mut writer = VecWriter::new("contacts.csv");
    let report = engine.run(&mut writer).await.unwrap();
    assert_eq!(report.written, 4);
    let stamped = history.last_run("contacts.csv").await.unwrap().unwrap();
    assert!(stamped >= 1_700_000_000);

    // Second run only sees records created since the stamp
    let earlier = MemoryStore::new();
    earlier.record_run("contacts.csv", 1_700_000_250).await.unwrap();
    let connector = MemoryConnector::new("contacts")
        .with_records(contacts(4))
        .with_structure(structure);
    let mut engine = ExportEngine::new(connector, model(), config)
        .with_history(Arc::new(earlier) as Arc<dyn HistoryStore>);
    let mut writer = VecWriter::new("contacts.csv");
    let report = engine.run(&mut writer).await.unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(writer.rows[1], vec!["3", "user3@example.com"]);
    let filters = &engine.connector().calls().last_filters;
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].field, "sys_creation_date");
}

#[tokio::test]
async fn test_incremental_falls_back_to_creation_date() {
    let history = MemoryStore::new();
    history.record_run("out.csv", 10).await.unwrap();
    let connector = MemoryConnector::new("contacts")
        .with_records(vec![
            row(&[("id", json!(1)), ("email", json!("old")), ("creation_date", json!(5))]),
            row(&[("id", json!(2)), ("email", json!("new")), ("creation_date", json!(20))]),
        ])
        .with_structure(Structure::new([("id", "integer"), ("creation_date", "timestamp")]));
    let config = ExportConfig {
        incremental: true,
        header: false,
        ..ExportConfig::default()
    };
    let mut engine = ExportEngine::new(connector, model(), config)
        .with_history(Arc::new(history) as Arc<dyn HistoryStore>);
    let mut writer = VecWriter::new("out.csv");

    engine.run(&mut writer).await.unwrap();
    assert_eq!(writer.rows, vec![vec!["2", "new"]]);
    assert_eq!(engine.connector().calls().last_filters[0].field, "creation_date");
}

#[tokio::test]
async fn test_timestamp_formatting() {
    let connector = MemoryConnector::new("contacts")
        .with_records(vec![row(&[("id", json!(1)), ("created", json!(0))])])
        .with_structure(Structure::new([("id", "integer"), ("created", "Timestamp")]));
    let model = Model::new(vec![
        Field::new("id"),
        Field::new("created_on").with_alias(Alias::simple("created")),
    ])
    .unwrap();
    let config = ExportConfig {
        header: false,
        timestamp_format: Some("%Y-%m-%d %H:%M".to_string()),
        ..ExportConfig::default()
    };
    let mut engine = ExportEngine::new(connector, model, config);
    let mut writer = VecWriter::new("out.csv");

    engine.run(&mut writer).await.unwrap();
    assert_eq!(writer.rows, vec![vec!["1", "1970-01-01 00:00"]]);
}

struct FailingTransport;

#[async_trait]
impl FileTransport for FailingTransport {
    async fn upload(&self, _local: &Path, _remote_name: &str) -> anyhow::Result<FileLocation> {
        anyhow::bail!("connection refused")
    }
}

#[tokio::test]
async fn test_transfer_failure_keeps_file_and_history() {
    let history = Arc::new(MemoryStore::new());
    let connector = MemoryConnector::new("contacts").with_records(contacts(2));
    let config = ExportConfig {
        incremental: true,
        ..ExportConfig::default()
    };
    let mut engine = ExportEngine::new(connector, model(), config)
        .with_history(history.clone() as Arc<dyn HistoryStore>)
        .with_transport(Box::new(FailingTransport));
    let mut writer = VecWriter::new("contacts.csv");

    let err = engine.run(&mut writer).await.unwrap_err();

    assert!(matches!(err, EngineError::Transfer(_)));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(writer.rows.len(), 3);
    assert!(writer.flushed);
    assert_eq!(history.last_run("contacts.csv").await.unwrap(), None);
}

#[tokio::test]
async fn test_export_forwarded_to_local_directory() {
    let temp = tempfile::TempDir::new().unwrap();
    let output = temp.path().join("contacts.csv");
    let outbox = temp.path().join("outbox");

    let connector = MemoryConnector::new("contacts").with_records(contacts(2));
    let config = ExportConfig {
        remote_name: Some("contacts-latest.csv".to_string()),
        ..ExportConfig::default()
    };
    let mut engine = ExportEngine::new(connector, model(), config)
        .with_transport(Box::new(LocalTransport::new(outbox.clone())));
    let mut writer = tabsync_csv::CsvWriter::create(&output, b',').unwrap();

    let report = engine.run(&mut writer).await.unwrap();
    drop(writer);

    assert_eq!(
        report.uploaded_to,
        Some(FileLocation::Local(outbox.join("contacts-latest.csv")))
    );
    let forwarded = std::fs::read_to_string(outbox.join("contacts-latest.csv")).unwrap();
    assert_eq!(
        forwarded,
        "id,email\n1,user1@example.com\n2,user2@example.com\n"
    );
}
