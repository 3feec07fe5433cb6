//! Job file configuration.
//!
//! A job file describes one remote object, the CSV side and the field model.
//! YAML (`.yaml`, `.yml`) and TOML (`.toml`) are supported:
//!
//! ```yaml
//! api:
//!   base_url: https://api.example.com/v1
//!   object: contacts
//!   timeout: 30s
//! csv:
//!   delimiter: ";"
//! fields:
//!   - name: email
//!     type: primary_key
//!     transforms: [{ type: trim }, { type: lowercase }]
//!   - name: full_name
//!     alias: { type: formatted, template: "%first% %last%" }
//! import:
//!   input: s3://inbox/contacts.csv
//! export:
//!   output: out/contacts.csv
//!   incremental: true
//! ```

pub mod duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::{Field, Model};
use tabsync_connector::RestConfig;
use tabsync_csv::CsvOptions;
use tabsync_engine::{DeleteMode, ExportConfig, ImportConfig, MappedLookup};

use self::duration::deserialize_duration;

/// Default location of the run history file
pub const DEFAULT_HISTORY_PATH: &str = ".tabsync/history.json";

/// Top-level job configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub api: ApiConfig,

    #[serde(default)]
    pub csv: CsvConfig,

    pub fields: Vec<Field>,

    #[serde(default)]
    pub import: ImportSection,

    #[serde(default)]
    pub sync: SyncSection,

    /// Mapped lookups applied during import and sync
    #[serde(default)]
    pub mapped: Option<MappedLookup>,

    #[serde(default)]
    pub export: ExportSection,

    #[serde(default)]
    pub history: HistorySection,

    /// Where finished exports are forwarded
    #[serde(default)]
    pub transport: Option<TransportSection>,
}

/// Remote API settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,

    pub object: String,

    /// Bearer token; the CLI's `TABSYNC_API_TOKEN` takes precedence
    pub token: Option<String>,

    pub per_page: Option<u32>,

    /// Use batched insert/delete calls
    pub batch: bool,

    /// Width of the request fan-out for batched calls
    pub concurrency: usize,

    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    pub activity_object: String,

    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let rest = RestConfig::default();
        Self {
            base_url: rest.base_url,
            object: rest.object,
            token: rest.token,
            per_page: rest.per_page,
            batch: rest.batch,
            concurrency: rest.concurrency,
            timeout: rest.timeout,
            activity_object: rest.activity_object,
            max_retries: rest.max_retries,
        }
    }
}

impl ApiConfig {
    /// Connector configuration, with `token` overriding the file's token.
    pub fn to_rest_config(&self, token: Option<String>) -> RestConfig {
        RestConfig {
            base_url: self.base_url.clone(),
            object: self.object.clone(),
            token: token.or_else(|| self.token.clone()),
            per_page: self.per_page,
            batch: self.batch,
            concurrency: self.concurrency,
            timeout: self.timeout,
            activity_object: self.activity_object.clone(),
            max_retries: self.max_retries,
        }
    }
}

/// CSV dialect shared by input, output and transaction logs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub delimiter: char,

    pub has_headers: bool,

    /// Column names for files without a header row
    pub column_names: Option<Vec<String>>,

    pub trim: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_headers: true,
            column_names: None,
            trim: false,
        }
    }
}

impl CsvConfig {
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("CSV delimiter '{}' is not a single ASCII character", self.delimiter))
    }

    pub fn to_options(&self) -> Result<CsvOptions> {
        Ok(CsvOptions {
            has_headers: self.has_headers,
            delimiter: self.delimiter_byte()?,
            column_names: self.column_names.clone(),
            trim: self.trim,
        })
    }
}

/// Import (and sync) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSection {
    /// Input file: local path, `s3://` or `http(s)://` URI
    pub input: Option<String>,

    pub batch_size: usize,

    pub source_field: String,

    pub source_value: String,

    pub synced_at_field: Option<String>,

    pub validate_structure: bool,

    pub activity: bool,

    pub deletion_marker: String,

    /// Directory of the transaction logs (default: next to the input)
    pub log_dir: Option<PathBuf>,

    /// Download directory for remote inputs (default: system temp dir)
    pub download_dir: Option<PathBuf>,
}

impl Default for ImportSection {
    fn default() -> Self {
        let defaults = ImportConfig::default();
        Self {
            input: None,
            batch_size: defaults.batch_size,
            source_field: defaults.source_field,
            source_value: defaults.source_value,
            synced_at_field: defaults.synced_at_field,
            validate_structure: defaults.validate_structure,
            activity: defaults.activity,
            deletion_marker: defaults.deletion_marker,
            log_dir: None,
            download_dir: None,
        }
    }
}

impl ImportSection {
    /// Engine configuration without reconciliation or enrichment.
    pub fn to_import_config(&self, dry_run: bool) -> ImportConfig {
        ImportConfig {
            batch_size: self.batch_size,
            source_field: self.source_field.clone(),
            source_value: self.source_value.clone(),
            synced_at_field: self.synced_at_field.clone(),
            validate_structure: self.validate_structure,
            dry_run,
            activity: self.activity,
            deletion_marker: self.deletion_marker.clone(),
            ..ImportConfig::default()
        }
    }
}

/// Sync settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub delete_mode: DeleteMode,
}

/// Export settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub output: Option<PathBuf>,

    pub header: bool,

    /// Append to an existing output file instead of replacing it
    pub append: bool,

    pub incremental: bool,

    pub timestamp_format: Option<String>,

    pub history_key: Option<String>,

    pub remote_name: Option<String>,

    pub activity: bool,
}

impl Default for ExportSection {
    fn default() -> Self {
        let defaults = ExportConfig::default();
        Self {
            output: None,
            header: defaults.header,
            append: false,
            incremental: defaults.incremental,
            timestamp_format: defaults.timestamp_format,
            history_key: defaults.history_key,
            remote_name: defaults.remote_name,
            activity: defaults.activity,
        }
    }
}

impl ExportSection {
    pub fn to_export_config(&self, incremental: bool) -> ExportConfig {
        ExportConfig {
            header: self.header,
            incremental: incremental || self.incremental,
            timestamp_format: self.timestamp_format.clone(),
            history_key: self.history_key.clone(),
            remote_name: self.remote_name.clone(),
            activity: self.activity,
        }
    }
}

/// Run history settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub path: PathBuf,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_HISTORY_PATH),
        }
    }
}

/// Export forwarding settings
#[derive(Debug, Clone, Deserialize)]
pub struct TransportSection {
    /// Destination directory or prefix: local path, `s3://` or `http(s)://`
    pub destination: String,

    /// Bearer token for HTTP destinations; the API token is never forwarded
    #[serde(default)]
    pub token: Option<String>,
}

impl JobConfig {
    /// Load a job file, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let job = match extension.as_deref() {
            Some("toml") => Self::from_toml(&content),
            Some("yaml") | Some("yml") | None => Self::from_yaml(&content),
            Some(other) => anyhow::bail!("Unsupported job file extension '.{other}'"),
        };
        job.with_context(|| format!("Invalid job file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn model(&self) -> Result<Model> {
        Model::new(self.fields.clone()).context("Invalid field model")
    }
}
