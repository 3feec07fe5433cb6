//! Runs import, sync and export jobs described by a [`JobConfig`].

use anyhow::{Context, Result};
use checkpoint::FilesystemStore;
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::RecordReader;
use tabsync_connector::RestConnector;
use tabsync_csv::{CsvReader, CsvTransactionLog, CsvWriter};
use tabsync_engine::{
    DeleteMissing, DeleteMode, Enrichment, ExportEngine, ExportReport, ImportEngine,
    ImportReport, Reconciliation,
};
use tabsync_file::{transport_for, FileLocation};

use crate::config::JobConfig;

/// Per-invocation overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bearer token overriding the job file's token
    pub token: Option<String>,

    /// Map, dedupe and log without writing to the API
    pub dry_run: bool,

    /// Force incremental export
    pub incremental: bool,
}

/// Import the job's input file, deleting missing remote records when `sync`.
pub async fn run_import(job: &JobConfig, sync: bool, options: &RunOptions) -> Result<ImportReport> {
    let model = job.model()?;
    let input = job
        .import
        .input
        .as_deref()
        .context("The job has no import.input")?;
    let location = FileLocation::parse(input)?;

    let download_dir = job
        .import
        .download_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("tabsync"));
    let local_input = location.fetch_into(&download_dir).await?;

    let csv_options = job.csv.to_options()?;
    let mut reader = CsvReader::open(&local_input, &csv_options)
        .with_context(|| format!("Failed to open {}", local_input.display()))?;

    // Remote inputs are logged into the working directory unless configured.
    let log_dir = match (&job.import.log_dir, location.is_local()) {
        (Some(dir), _) => Some(dir.clone()),
        (None, false) => Some(PathBuf::from(".")),
        (None, true) => None,
    };
    let header = reader.headers().map(<[String]>::to_vec);
    let mut log = CsvTransactionLog::new(
        &local_input,
        log_dir.as_deref(),
        header,
        csv_options.delimiter,
    )?;

    let mut config = job.import.to_import_config(options.dry_run);
    if let Some(mapped) = &job.mapped {
        config.enrichment = Enrichment::Mapped(mapped.clone());
    }
    if sync {
        let mode = if job.mapped.is_some() {
            DeleteMode::OneByOne
        } else {
            job.sync.delete_mode
        };
        config.reconciliation = Reconciliation::DeleteMissing(DeleteMissing { mode, exempt: None });
    }

    let connector = RestConnector::new(job.api.to_rest_config(options.token.clone()))?;
    let mut engine = ImportEngine::new(connector, model, config)?;
    let report = engine.run(&mut reader, &mut log).await?;

    if log.success_count() > 0 {
        tracing::info!("Success log: {}", log.success_path().display());
    }
    if log.failure_count() > 0 {
        tracing::warn!(
            "{} failures logged to {}",
            log.failure_count(),
            log.failure_path().display()
        );
    }
    Ok(report)
}

/// Export the job's remote object to its output file.
pub async fn run_export(job: &JobConfig, options: &RunOptions) -> Result<ExportReport> {
    let model = job.model()?;
    let output = job
        .export
        .output
        .as_ref()
        .context("The job has no export.output")?;
    let delimiter = job.csv.delimiter_byte()?;
    let mut writer = if job.export.append {
        CsvWriter::append(output, delimiter)
    } else {
        CsvWriter::create(output, delimiter)
    }
    .with_context(|| format!("Failed to open {}", output.display()))?;

    let config = job.export.to_export_config(options.incremental);
    let incremental = config.incremental;
    let connector = RestConnector::new(job.api.to_rest_config(options.token.clone()))?;
    let mut engine = ExportEngine::new(connector, model, config);

    if incremental {
        let store = FilesystemStore::open(&job.history.path)?;
        engine = engine.with_history(Arc::new(store));
    }
    if let Some(transport) = &job.transport {
        let destination = FileLocation::parse(&transport.destination)?;
        engine = engine.with_transport(transport_for(&destination, transport.token.clone()).await?);
    }

    Ok(engine.run(&mut writer).await?)
}
