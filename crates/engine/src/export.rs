//! Export engine
//!
//! Pages through a remote object, maps every record through the [`Model`] and
//! writes it to a [`RecordWriter`]. The finished file can be forwarded through
//! a [`FileTransport`]. In incremental mode only records created since the
//! last successful run of the same output are fetched.

use checkpoint::HistoryStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use sync_core::transform::{format_datetime, parse_datetime};
use sync_core::{value_to_string, Alias, ConfigError, Field, Model, RecordWriter, Row};
use tabsync_connector::{ActivitySummary, Filter, RemoteConnector, RunKind, Structure};
use tabsync_file::FileTransport;

use crate::error::EngineError;
use crate::report::ExportReport;

/// Creation time field preferred by incremental exports
pub const SYSTEM_CREATION_FIELD: &str = "sys_creation_date";

/// Creation time field used when the object has no system creation field
pub const CREATION_FIELD: &str = "creation_date";

/// Configuration for an export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Write the model keys as the first row (skipped when appending)
    pub header: bool,

    /// Only export records created since the last successful run
    pub incremental: bool,

    /// chrono pattern applied to timestamp-typed fields holding unix seconds
    pub timestamp_format: Option<String>,

    /// Run history key (default: output file name)
    pub history_key: Option<String>,

    /// Name under which the transport stores the file (default: output file name)
    pub remote_name: Option<String>,

    /// Send an activity summary at the end of the run
    pub activity: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            header: true,
            incremental: false,
            timestamp_format: None,
            history_key: None,
            remote_name: None,
            activity: true,
        }
    }
}

/// Drives one export run against a connector it owns.
pub struct ExportEngine<C: RemoteConnector> {
    connector: C,
    model: Model,
    config: ExportConfig,
    history: Option<Arc<dyn HistoryStore>>,
    transport: Option<Box<dyn FileTransport>>,
}

impl<C: RemoteConnector> ExportEngine<C> {
    pub fn new(mut connector: C, model: Model, config: ExportConfig) -> Self {
        connector.set_primary_key(model.primary_key().map(str::to_string));
        Self {
            connector,
            model,
            config,
            history: None,
            transport: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_transport(mut self, transport: Box<dyn FileTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn into_connector(self) -> C {
        self.connector
    }

    pub async fn run(&mut self, writer: &mut dyn RecordWriter) -> Result<ExportReport, EngineError> {
        let started = Instant::now();
        let run_started_at = chrono::Utc::now().timestamp();
        let file_name = writer
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.connector.object().to_string());
        tracing::info!(
            "Starting export of '{}' to {}",
            self.connector.object(),
            writer.path().display()
        );

        let history = match (self.config.incremental, &self.history) {
            (true, Some(history)) => Some(Arc::clone(history)),
            (true, None) => {
                return Err(ConfigError::Invalid(
                    "incremental export requires a run history store".to_string(),
                )
                .into())
            }
            (false, _) => None,
        };
        let history_key = self
            .config
            .history_key
            .clone()
            .unwrap_or_else(|| file_name.clone());

        let structure = if history.is_some() || self.config.timestamp_format.is_some() {
            self.connector.get_structure().await?
        } else {
            Structure::default()
        };

        let mut extra = Vec::new();
        if let Some(history) = &history {
            let last_run = history
                .last_run(&history_key)
                .await
                .map_err(EngineError::History)?;
            match last_run {
                Some(since) => {
                    let field = if structure.has_field(SYSTEM_CREATION_FIELD) {
                        SYSTEM_CREATION_FIELD
                    } else {
                        CREATION_FIELD
                    };
                    tracing::info!("Incremental export: {} >= {}", field, since);
                    extra.push(Filter::gte(field, since));
                }
                None => tracing::info!("No previous run for '{}'; exporting everything", history_key),
            }
        }

        let mut report = ExportReport::default();
        let mut header_pending = self.config.header && !writer.is_append();
        self.connector.set_page(1);
        loop {
            let page = self.connector.get_records(&extra).await?;
            report.pages += 1;
            let empty = page.records.is_empty();

            for record in &page.records {
                let mut row = match self.model.fill(record) {
                    Ok(row) => row,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!("Skipping record: {}", e);
                        continue;
                    }
                };
                if let Some(pattern) = &self.config.timestamp_format {
                    format_timestamps(&self.model, &structure, pattern, &mut row);
                }

                if header_pending {
                    writer.write_record(&self.model.keys())?;
                    header_pending = false;
                }
                let values: Vec<String> = row.values().map(value_to_string).collect();
                writer.write_record(&values)?;
                report.written += 1;
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
        writer.flush()?;

        if let Some(transport) = &self.transport {
            let remote_name = self.config.remote_name.as_deref().unwrap_or(&file_name);
            let location = transport
                .upload(writer.path(), remote_name)
                .await
                .map_err(EngineError::Transfer)?;
            tracing::info!("Forwarded export to {}", location.display_name());
            report.uploaded_to = Some(location);
        }

        if let Some(history) = &history {
            history
                .record_run(&history_key, run_started_at)
                .await
                .map_err(EngineError::History)?;
        }

        report.duration = started.elapsed();
        tracing::info!(
            "Finished export of '{}': {} written, {} failed over {} pages in {:.2}s",
            self.connector.object(),
            report.written,
            report.failed,
            report.pages,
            report.duration.as_secs_f64()
        );

        if self.config.activity {
            let summary = ActivitySummary {
                run_id: uuid::Uuid::new_v4().to_string(),
                kind: RunKind::Export,
                object: self.connector.object().to_string(),
                file: writer.path().display().to_string(),
                success: report.written,
                failed: report.failed,
                deleted: 0,
                duration_secs: report.duration.as_secs_f64(),
                message: format!(
                    "export to {file_name}: {} written, {} failed",
                    report.written, report.failed
                ),
                finished_at: chrono::Utc::now().timestamp(),
            };
            if let Err(e) = self.connector.insert_activity_record(&summary).await {
                tracing::error!("Failed to record activity for {}: {}", file_name, e);
            }
        }
        Ok(report)
    }
}

/// Raw field a model field reads, for structure lookups.
fn source_field(field: &Field) -> Option<&str> {
    match &field.alias {
        Some(Alias::Simple { field }) => Some(field.as_str()),
        Some(_) => None,
        None => field.name.as_deref(),
    }
}

fn unix_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn format_timestamps(model: &Model, structure: &Structure, pattern: &str, row: &mut Row) {
    for field in model.fields() {
        let (Some(source), Ok(key)) = (source_field(field), field.key()) else {
            continue;
        };
        if !structure.is_timestamp(source) {
            continue;
        }
        let Some(value) = row.get_mut(key) else {
            continue;
        };
        if unix_seconds(value).is_none() {
            continue;
        }
        if let Some(formatted) =
            parse_datetime(value, None).and_then(|dt| format_datetime(&dt, pattern))
        {
            *value = Value::String(formatted);
        }
    }
}
