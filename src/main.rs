//! Command-line interface for tabsync
//!
//! # Usage Examples
//!
//! ```bash
//! # Import a CSV file described by a job file
//! tabsync import --job contacts.yaml
//!
//! # Check mapping and dedupe without writing to the API
//! tabsync import --job contacts.yaml --dry-run
//!
//! # Import, then delete remote records missing from the file
//! TABSYNC_API_TOKEN=... tabsync sync --job contacts.yaml
//!
//! # Export records created since the last export
//! tabsync export --job contacts.yaml --incremental
//! ```
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=tabsync_engine=debug`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tabsync::{run_export, run_import, JobConfig, RunOptions};

#[derive(Parser)]
#[command(name = "tabsync")]
#[command(about = "Import, sync and export tabular records between CSV files and a REST API")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct JobOpts {
    /// Job file (YAML or TOML)
    #[arg(long, value_name = "PATH")]
    job: PathBuf,

    /// API bearer token (overrides the job file)
    #[arg(long, env = "TABSYNC_API_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the job's input file into the remote object
    Import {
        #[command(flatten)]
        job_opts: JobOpts,

        /// Dry run mode - map and log records without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Import, then delete remote records missing from the input
    Sync {
        #[command(flatten)]
        job_opts: JobOpts,

        /// Dry run mode - map and log records without writing or deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Export the remote object to the job's output file
    Export {
        #[command(flatten)]
        job_opts: JobOpts,

        /// Only export records created since the last successful export
        #[arg(long)]
        incremental: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import { job_opts, dry_run } => {
            run_import_command(job_opts, false, dry_run).await?;
        }
        Commands::Sync { job_opts, dry_run } => {
            run_import_command(job_opts, true, dry_run).await?;
        }
        Commands::Export {
            job_opts,
            incremental,
        } => {
            let job = JobConfig::load(&job_opts.job)?;
            let options = RunOptions {
                token: job_opts.token,
                incremental,
                ..RunOptions::default()
            };
            let report = run_export(&job, &options).await?;
            println!(
                "Exported {} records ({} failed) from '{}'",
                report.written, report.failed, job.api.object
            );
            if let Some(location) = report.uploaded_to {
                println!("Forwarded to {}", location.display_name());
            }
        }
    }

    Ok(())
}

async fn run_import_command(job_opts: JobOpts, sync: bool, dry_run: bool) -> anyhow::Result<()> {
    let job = JobConfig::load(&job_opts.job)?;
    let options = RunOptions {
        token: job_opts.token,
        dry_run,
        ..RunOptions::default()
    };
    let report = run_import(&job, sync, &options).await?;
    println!(
        "{} {} records into '{}': {} failed, {} deleted",
        if sync { "Synced" } else { "Imported" },
        report.success,
        job.api.object,
        report.failed,
        report.deleted
    );
    Ok(())
}
