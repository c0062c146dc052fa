//! Command-line surface: flag parsing, logging initialization, and the
//! mapping from run outcomes to process exit codes.

use crate::load_config::{create_sample_config, load_config};
use crate::pipeline::{BackupPipeline, RunResult};
use crate::s3::S3BucketStore;
use crate::store::BucketStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Exit code for a fully successful (or empty) run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code when some uploads failed but the run completed.
pub const EXIT_PARTIAL_FAILURE: i32 = 2;
/// Exit code for configuration, initialization, or phase-level errors.
pub const EXIT_ERROR: i32 = 1;
/// Exit code when the run is interrupted by Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

/// CLI for s3-backup: upload a directory tree to an S3 bucket with
/// manifest generation and optional post-upload cleanup.
#[derive(Parser)]
#[clap(
    name = "s3-backup",
    version,
    about = "Back up local files to an S3 bucket, with manifests, size verification and optional local cleanup"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Simulate the run without uploading or deleting anything
    #[clap(short, long)]
    pub dry_run: bool,

    /// Write a sample config file to the --config path and exit
    #[clap(long)]
    pub create_config: bool,

    /// Show the effective configuration and bucket status, then exit
    #[clap(short, long)]
    pub status: bool,

    /// Write the full run result as JSON to the given path
    #[clap(long)]
    pub output_json: Option<PathBuf>,

    /// Enable debug-level logging
    #[clap(short, long)]
    pub verbose: bool,
}

/// Async CLI entrypoint, extracted from main() for integration tests.
/// Returns the process exit code; errors bubbling out map to [`EXIT_ERROR`].
pub async fn run(cli: Cli) -> Result<i32> {
    if cli.create_config {
        let path = create_sample_config(&cli.config)?;
        println!("Sample configuration written to {}", path.display());
        println!("Edit it with your AWS credentials and bucket before running a backup.");
        return Ok(EXIT_SUCCESS);
    }

    let config = load_config(&cli.config)?;
    let _log_guard = init_logging(&config.logging, cli.verbose)?;
    info!(config = %cli.config.display(), "Configuration loaded");

    let store = S3BucketStore::new(&config.aws, &config.s3)?;
    let pipeline = BackupPipeline::initialize(config, store).await?;

    if cli.status {
        print_status(&pipeline).await?;
        return Ok(EXIT_SUCCESS);
    }

    let results = pipeline.run(cli.dry_run).await?;
    print_summary(&results, cli.dry_run);

    if let Some(path) = &cli.output_json {
        let json = serde_json::to_string_pretty(&results.to_json())?;
        std::fs::write(path, json)
            .with_context(|| format!("writing JSON report to {}", path.display()))?;
        println!("JSON report written to {}", path.display());
    }

    if results.failed_uploads > 0 {
        Ok(EXIT_PARTIAL_FAILURE)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Initializes the global subscriber: stdout plus a daily-rolling file under
/// the configured log directory. The returned guard must outlive the run so
/// buffered file output is flushed.
fn init_logging(
    logging: &crate::config::LoggingConfig,
    verbose: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let level = if verbose { "debug" } else { &logging.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender =
        tracing_appender::rolling::daily(&logging.directory, &logging.file_name_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("initializing logging: {e}"))?;

    Ok(guard)
}

async fn print_status<S: BucketStore>(pipeline: &BackupPipeline<S>) -> Result<()> {
    let status = pipeline.status();
    println!("Backup configuration");
    println!("  Source directory:    {}", status.source_directory);
    println!("  Bucket:              {}", status.bucket_name);
    println!("  Key prefix:          {}", status.key_prefix);
    println!("  Delete after upload: {}", status.delete_after_upload);

    let prefix = if status.key_prefix.is_empty() {
        None
    } else {
        Some(status.key_prefix.as_str())
    };
    let objects = pipeline.store().list_objects(prefix).await?;
    let total_bytes: u64 = objects.iter().map(|o| o.size).sum();
    println!(
        "  Remote objects:      {} ({})",
        objects.len(),
        crate::catalog::human_size(total_bytes)
    );
    Ok(())
}

fn print_summary(results: &RunResult, dry_run: bool) {
    let mode = if dry_run { " (dry-run)" } else { "" };
    println!("Backup complete{mode}.");
    println!("  Files found:        {}", results.total_files);
    println!("  Uploads succeeded:  {}", results.successful_uploads);
    println!("  Uploads failed:     {}", results.failed_uploads);
    println!("  Local deletions:    {}", results.deleted_files);
    println!("  Deletions failed:   {}", results.failed_deletions);
    println!("  Success rate:       {:.1}%", results.success_rate());
    println!("  Duration:           {:.2}s", results.duration_seconds());

    for (path, error) in &results.upload_errors {
        eprintln!("  upload error: {path}: {error}");
    }
    for (path, error) in &results.deletion_errors {
        eprintln!("  deletion error: {path}: {error}");
    }
}
