//! CSV file to connector and back.

use serde_json::json;
use sync_core::{Alias, Field, Model, RecordReader, Row, Transform};
use tabsync_connector::MemoryConnector;
use tabsync_csv::{CsvOptions, CsvReader, CsvTransactionLog, CsvWriter};
use tabsync_engine::{
    DeleteMissing, ExportConfig, ExportEngine, ImportConfig, ImportEngine, Reconciliation,
};
use tempfile::TempDir;

fn model() -> Model {
    Model::new(vec![
        Field::primary_key("email")
            .with_transform(Transform::Trim)
            .with_transform(Transform::Lowercase),
        Field::new("full_name").with_alias(Alias::formatted("%first% %last%")),
        Field::new("age").with_transform(Transform::ToInteger),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_csv_import_logs_and_exports_back() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("people.csv");
    std::fs::write(
        &input,
        "email,first,last,age\n\
         Ann@Example.com,Ann,Lee,34\n\
         bob@example.com,Bob,Ray,x\n\
         ann@example.com,Ann,Again,35\n\
         eve@example.com,Eve,Moe,29\n",
    )
    .unwrap();

    let mut reader = CsvReader::open(&input, &CsvOptions::default()).unwrap();
    let logs = temp.path().join("logs");
    let header = reader.headers().map(<[String]>::to_vec);
    let mut log = CsvTransactionLog::new(&input, Some(&logs), header, b',').unwrap();
    let connector = MemoryConnector::new("people").fail_on("eve@example.com", "quota exceeded");
    let mut engine = ImportEngine::new(connector, model(), ImportConfig::default()).unwrap();

    let report = engine.run(&mut reader, &mut log).await.unwrap();

    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(engine.connector().calls().insert_batches, vec![3]);

    let stored = engine.connector().records();
    assert_eq!(stored[0]["email"], json!("ann@example.com"));
    assert_eq!(stored[0]["full_name"], json!("Ann Lee"));
    assert_eq!(stored[0]["age"], json!(34));
    assert_eq!(stored[1]["age"], json!(null));

    let success = std::fs::read_to_string(log.success_path()).unwrap();
    assert_eq!(
        success,
        "email,first,last,age\nAnn@Example.com,Ann,Lee,34\nbob@example.com,Bob,Ray,x\n"
    );
    let failure = std::fs::read_to_string(log.failure_path()).unwrap();
    let lines: Vec<&str> = failure.lines().collect();
    assert_eq!(lines[0], "email,first,last,age,error");
    assert_eq!(lines[1], "ann@example.com,Ann,Again,35,duplicate primary key");
    assert!(lines[2].starts_with("eve@example.com,Eve,Moe,29,"));
    assert!(lines[2].contains("quota exceeded"));

    // Export what the connector now holds
    let output = temp.path().join("out").join("people_export.csv");
    let records = engine.into_connector().records().to_vec();
    let connector = MemoryConnector::new("people").with_records(records);
    let export_model = Model::new(vec![Field::new("email"), Field::new("full_name")]).unwrap();
    let mut exporter = ExportEngine::new(connector, export_model, ExportConfig::default());
    let mut writer = CsvWriter::create(&output, b';').unwrap();

    let export = exporter.run(&mut writer).await.unwrap();
    drop(writer);

    assert_eq!(export.written, 2);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "email;full_name\nann@example.com;Ann Lee\nbob@example.com;Bob Ray\n"
    );
}

#[tokio::test]
async fn test_header_less_sync_names_failed_delete_by_key() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("people.csv");
    std::fs::write(&input, "alice,25\n").unwrap();

    let options = CsvOptions {
        has_headers: false,
        ..CsvOptions::default()
    };
    let mut reader = CsvReader::open(&input, &options).unwrap();
    let mut log = CsvTransactionLog::new(&input, None, None, b',').unwrap();

    let remote: Vec<Row> = ["alice", "bob"]
        .iter()
        .map(|name| {
            [
                ("name".to_string(), json!(name)),
                ("source".to_string(), json!("sdk")),
            ]
            .into_iter()
            .collect::<Row>()
        })
        .collect();
    let connector = MemoryConnector::new("people")
        .with_records(remote)
        .fail_on("bob", "locked");
    let model = Model::new(vec![
        Field::primary_key("name").with_alias(Alias::simple("column_0")),
        Field::new("age").with_alias(Alias::simple("column_1")),
    ])
    .unwrap();
    let config = ImportConfig {
        reconciliation: Reconciliation::DeleteMissing(DeleteMissing::default()),
        validate_structure: false,
        ..ImportConfig::default()
    };
    let mut engine = ImportEngine::new(connector, model, config).unwrap();

    let report = engine.run(&mut reader, &mut log).await.unwrap();

    assert_eq!(report.success, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.failed, 1);
    let failure = std::fs::read_to_string(log.failure_path()).unwrap();
    assert_eq!(
        failure,
        "column_0,column_1,error\n,,delete failed for 'bob': locked\n"
    );
}
