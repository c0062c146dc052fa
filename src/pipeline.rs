//! Backup pipeline orchestration: sequences enumerate → manifest → upload →
//! delete → prune, owns the [`RunResult`] accumulator and produces the final
//! report.
//!
//! # Major Types
//! - [`BackupPipeline`]: the initialized pipeline. There is no uninitialized
//!   value: [`BackupPipeline::initialize`] is the only constructor, wires the
//!   collaborators and performs the eager bucket reachability probe, so a
//!   "not yet initialized" state is unrepresentable afterwards.
//! - [`RunResult`]: per-run accumulator, created fresh at the start of every
//!   run and finalized on every exit path, success or error.
//!
//! # Error Handling
//! Per-file upload/deletion failures are captured into the result and never
//! escape their phase. Phase-level failures (enumeration, manifest write) and
//! initialization failures escalate as [`PipelineError`] with the original
//! cause attached.

use crate::catalog::{CatalogError, FileCatalog};
use crate::config::AppConfig;
use crate::retention::{self, DeletionOutcome};
use crate::store::{BucketStore, StoreError};
use crate::upload::{self, UploadOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The store was unreachable during initialization; nothing was touched.
    #[error("pipeline initialization failed: {0}")]
    Initialization(#[source] StoreError),
    /// A phase-level catalog failure (enumeration or manifest write).
    #[error("backup run failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Mutable accumulator for one run. Owned exclusively by the pipeline for the
/// lifetime of the run, handed to the caller as the immutable report after.
#[derive(Debug, Serialize)]
pub struct RunResult {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_files: usize,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub deleted_files: usize,
    pub failed_deletions: usize,
    /// `(local_path, remote_key)` per successful upload, in input order.
    pub uploaded_files: Vec<(String, String)>,
    /// `(local_path, error_message)` per failed upload, in input order.
    pub upload_errors: Vec<(String, String)>,
    /// `(local_path, error_message)` per failed deletion, in input order.
    pub deletion_errors: Vec<(String, String)>,
}

impl RunResult {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            total_files: 0,
            successful_uploads: 0,
            failed_uploads: 0,
            deleted_files: 0,
            failed_deletions: 0,
            uploaded_files: Vec::new(),
            upload_errors: Vec::new(),
            deletion_errors: Vec::new(),
        }
    }

    /// Stamps the end time. Idempotent: only the first call takes effect.
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    /// Run duration in seconds: final duration once finished, wall-clock
    /// elapsed time while still running.
    pub fn duration_seconds(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// Upload success rate as a percentage; `0.0` for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.successful_uploads as f64 / self.total_files as f64 * 100.0
    }

    pub fn record_upload(&mut self, path: &Path, outcome: UploadOutcome) {
        let path = path.display().to_string();
        match outcome {
            UploadOutcome::Success { remote_key } => {
                self.successful_uploads += 1;
                self.uploaded_files.push((path, remote_key));
            }
            UploadOutcome::Failure { error } => {
                self.failed_uploads += 1;
                self.upload_errors.push((path, error.to_string()));
            }
        }
    }

    pub fn record_deletion(&mut self, path: &str, outcome: DeletionOutcome) {
        match outcome {
            DeletionOutcome::Deleted => self.deleted_files += 1,
            DeletionOutcome::Skipped { reason } => {
                debug!(file = %path, reason = %reason, "Deletion recorded as skipped")
            }
            DeletionOutcome::Failed { reason } => {
                self.failed_deletions += 1;
                self.deletion_errors.push((path.to_string(), reason));
            }
        }
    }

    /// Serializes the full result for `--output-json`: RFC-3339 timestamps,
    /// duration, counters, success rate and the three path/detail lists.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "start_time": self.start_time.to_rfc3339(),
            "end_time": self.end_time.map(|t| t.to_rfc3339()),
            "duration_seconds": self.duration_seconds(),
            "total_files": self.total_files,
            "successful_uploads": self.successful_uploads,
            "failed_uploads": self.failed_uploads,
            "deleted_files": self.deleted_files,
            "failed_deletions": self.failed_deletions,
            "success_rate_percent": self.success_rate(),
            "uploaded_files": self.uploaded_files,
            "upload_errors": self.upload_errors,
            "deletion_errors": self.deletion_errors,
        })
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the pipeline's effective configuration, for `--status`.
#[derive(Debug, Serialize)]
pub struct PipelineStatus {
    pub source_directory: String,
    pub bucket_name: String,
    pub key_prefix: String,
    pub delete_after_upload: bool,
}

/// The initialized backup pipeline: validated config plus a reachable store.
pub struct BackupPipeline<S> {
    config: AppConfig,
    catalog: FileCatalog,
    store: S,
}

impl<S: BucketStore> BackupPipeline<S> {
    /// Wires the collaborators and verifies the bucket is reachable before
    /// any file work begins. On failure nothing is constructed, leaving the
    /// caller free to retry.
    pub async fn initialize(config: AppConfig, store: S) -> Result<Self, PipelineError> {
        info!("Initializing backup pipeline");
        store
            .bucket_reachable()
            .await
            .map_err(PipelineError::Initialization)?;

        let catalog = FileCatalog::new(config.backup.clone());
        info!(bucket = %config.s3.bucket_name, "Pipeline initialized");
        Ok(Self {
            config,
            catalog,
            store,
        })
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            source_directory: self.config.backup.source_directory.display().to_string(),
            bucket_name: self.config.s3.bucket_name.clone(),
            key_prefix: self.config.s3.prefix.clone(),
            delete_after_upload: self.config.backup.delete_after_upload,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Executes the full backup run. The result is finalized on every exit
    /// path, so duration and partial counters survive a phase failure.
    pub async fn run(&self, dry_run: bool) -> Result<RunResult, PipelineError> {
        let mut results = RunResult::new();
        info!(dry_run, "Starting backup run");
        if dry_run {
            info!("DRY-RUN mode: no uploads or deletions will be performed");
        }

        match self.execute(dry_run, &mut results).await {
            Ok(()) => {
                results.finish();
                self.log_summary(&results);
                Ok(results)
            }
            Err(e) => {
                results.finish();
                warn!(error = %e, "Backup run aborted after {:.2}s", results.duration_seconds());
                Err(e)
            }
        }
    }

    async fn execute(&self, dry_run: bool, results: &mut RunResult) -> Result<(), PipelineError> {
        // Phase 1: enumerate.
        info!("Phase 1: enumerating files");
        let entries = self.catalog.enumerate()?;
        results.total_files = entries.len();

        if entries.is_empty() {
            // Successful-but-empty outcome: no manifest, all counters zero.
            warn!("No files found for backup");
            return Ok(());
        }
        info!(count = entries.len(), "Found files for backup");

        // Phase 2: manifest (a required artifact outside dry-run).
        if !dry_run {
            let manifest_path = self.catalog.write_manifest(&entries, None)?;
            info!(manifest = %manifest_path.display(), "Manifest created");
        }

        // Phase 3: uploads, strictly sequential.
        info!("Phase 2: uploading files");
        upload::upload_all(
            &self.store,
            &self.config.s3.prefix,
            &entries,
            dry_run,
            results,
        )
        .await;

        // Phase 4: optional deletion of uploaded local copies.
        if self.config.backup.delete_after_upload {
            info!("Phase 3: deleting local files");
            let uploaded = results.uploaded_files.clone();
            retention::delete_uploaded(&self.config.backup, &uploaded, dry_run, results);

            // Phase 5: prune directories the deletions emptied.
            if !dry_run {
                let removed = self.catalog.prune_empty_dirs();
                if removed > 0 {
                    info!(removed, "Removed empty directories");
                }
            }
        }

        Ok(())
    }

    fn log_summary(&self, results: &RunResult) {
        info!(
            duration_seconds = format!("{:.2}", results.duration_seconds()),
            total_files = results.total_files,
            successful_uploads = results.successful_uploads,
            failed_uploads = results.failed_uploads,
            success_rate = format!("{:.1}", results.success_rate()),
            "Backup run complete"
        );
        if self.config.backup.delete_after_upload {
            info!(
                deleted_files = results.deleted_files,
                failed_deletions = results.failed_deletions,
                "Deletion summary"
            );
        }
        for (path, error) in &results.upload_errors {
            warn!(file = %path, error = %error, "Upload error");
        }
        for (path, error) in &results.deletion_errors {
            warn!(file = %path, error = %error, "Deletion error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AwsConfig, BackupConfig, LoggingConfig, S3Config};
    use crate::store::{MockBucketStore, RemoteObject};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn app_config(source: PathBuf, manifest_dir: PathBuf, delete_after_upload: bool) -> AppConfig {
        AppConfig {
            aws: AwsConfig {
                access_key_id: "key".to_string(),
                secret_access_key: "secret".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
            },
            s3: S3Config {
                bucket_name: "test-bucket".to_string(),
                prefix: "backups".to_string(),
            },
            backup: BackupConfig {
                source_directory: source,
                file_extensions: vec!["*".to_string()],
                delete_after_upload,
                manifest_dir,
            },
            logging: LoggingConfig::default(),
        }
    }

    fn reachable_store() -> MockBucketStore {
        let mut store = MockBucketStore::new();
        store.expect_bucket_reachable().returning(|| Ok(()));
        store
    }

    #[test]
    fn success_rate_edges() {
        let mut results = RunResult::new();
        assert_eq!(results.success_rate(), 0.0);

        results.total_files = 4;
        results.successful_uploads = 4;
        assert_eq!(results.success_rate(), 100.0);

        results.successful_uploads = 3;
        results.failed_uploads = 1;
        assert_eq!(results.success_rate(), 75.0);
    }

    #[test]
    fn finish_stamps_end_time_once() {
        let mut results = RunResult::new();
        assert!(results.end_time.is_none());
        // Duration is observable mid-run.
        assert!(results.duration_seconds() >= 0.0);

        results.finish();
        let first = results.end_time.unwrap();
        results.finish();
        assert_eq!(results.end_time.unwrap(), first);
    }

    #[test]
    fn json_report_carries_counters_and_lists() {
        let mut results = RunResult::new();
        results.total_files = 2;
        results.record_upload(
            Path::new("/src/a.txt"),
            UploadOutcome::Success {
                remote_key: "backups/a.txt".to_string(),
            },
        );
        results.record_upload(
            Path::new("/src/b.txt"),
            UploadOutcome::Failure {
                error: crate::upload::UploadError::LocalFile("gone".to_string()),
            },
        );
        results.finish();

        let json = results.to_json();
        assert_eq!(json["total_files"], 2);
        assert_eq!(json["successful_uploads"], 1);
        assert_eq!(json["failed_uploads"], 1);
        assert_eq!(json["success_rate_percent"], 50.0);
        assert_eq!(json["uploaded_files"][0][1], "backups/a.txt");
        assert!(json["end_time"].is_string());
    }

    #[tokio::test]
    async fn initialization_fails_fast_when_bucket_unreachable() {
        let dir = TempDir::new().unwrap();
        let mut store = MockBucketStore::new();
        store
            .expect_bucket_reachable()
            .returning(|| Err(StoreError::NotFound("test-bucket".to_string())));

        let config = app_config(
            dir.path().to_path_buf(),
            dir.path().join("manifests"),
            false,
        );
        let result = BackupPipeline::initialize(config, store).await;
        assert!(matches!(result, Err(PipelineError::Initialization(_))));
    }

    #[tokio::test]
    async fn empty_source_short_circuits_without_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest_dir = dir.path().join("manifests");
        let config = app_config(dir.path().to_path_buf(), manifest_dir.clone(), false);

        let pipeline = BackupPipeline::initialize(config, reachable_store())
            .await
            .unwrap();
        let results = pipeline.run(false).await.unwrap();

        assert_eq!(results.total_files, 0);
        assert_eq!(results.successful_uploads, 0);
        assert_eq!(results.failed_uploads, 0);
        assert!(results.end_time.is_some());
        assert!(!manifest_dir.exists(), "no manifest for an empty run");
    }

    #[tokio::test]
    async fn partial_failure_keeps_counters_consistent() {
        let dir = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), b"payload").unwrap();
        }

        let mut store = reachable_store();
        store.expect_put_object().returning(|path, _| {
            if path.ends_with("b.txt") {
                Err(StoreError::Transport("503".to_string()))
            } else {
                Ok(())
            }
        });
        store.expect_head_object().returning(|key| {
            Ok(RemoteObject {
                key: key.to_string(),
                size: 7,
            })
        });

        let config = app_config(
            dir.path().to_path_buf(),
            dir.path().join("manifests"),
            false,
        );
        let pipeline = BackupPipeline::initialize(config, store).await.unwrap();
        let results = pipeline.run(false).await.unwrap();

        assert_eq!(results.total_files, 3);
        assert_eq!(results.successful_uploads, 2);
        assert_eq!(results.failed_uploads, 1);
        assert_eq!(
            results.successful_uploads + results.failed_uploads,
            results.total_files
        );
        // Deletion disabled: local files remain, deletion counters zero.
        assert_eq!(results.deleted_files, 0);
        assert_eq!(results.failed_deletions, 0);
        assert!(dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn delete_after_upload_removes_only_uploaded_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/keep-fails.txt"), b"payload").unwrap();
        std::fs::write(dir.path().join("ok.txt"), b"payload").unwrap();

        let manifest_dir = TempDir::new().unwrap();
        let mut store = reachable_store();
        store.expect_put_object().returning(|path, _| {
            if path.ends_with("keep-fails.txt") {
                Err(StoreError::Transport("timeout".to_string()))
            } else {
                Ok(())
            }
        });
        store.expect_head_object().returning(|key| {
            Ok(RemoteObject {
                key: key.to_string(),
                size: 7,
            })
        });

        let config = app_config(
            dir.path().to_path_buf(),
            manifest_dir.path().join("manifests"),
            true,
        );
        let pipeline = BackupPipeline::initialize(config, store).await.unwrap();
        let results = pipeline.run(false).await.unwrap();

        assert_eq!(results.successful_uploads, 1);
        assert_eq!(results.deleted_files, 1);
        assert!(results.deleted_files + results.failed_deletions <= results.successful_uploads);
        assert!(!dir.path().join("ok.txt").exists());
        // The failed upload's local copy must survive.
        assert!(dir.path().join("nested/keep-fails.txt").exists());
        // Its directory is non-empty, so pruning left it alone.
        assert!(dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn dry_run_matches_real_run_counts_without_side_effects() {
        let dir = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt"] {
            std::fs::write(dir.path().join(name), b"payload").unwrap();
        }
        let manifest_dir = dir.path().join("manifests");

        let mut store = reachable_store();
        store.expect_put_object().times(0);
        store.expect_head_object().times(0);

        let config = app_config(dir.path().to_path_buf(), manifest_dir.clone(), true);
        let pipeline = BackupPipeline::initialize(config, store).await.unwrap();
        let results = pipeline.run(true).await.unwrap();

        assert_eq!(results.total_files, 2);
        assert_eq!(results.successful_uploads, 2);
        assert_eq!(results.deleted_files, 2);
        assert!(dir.path().join("a.txt").exists());
        assert!(dir.path().join("b.txt").exists());
        assert!(!manifest_dir.exists(), "dry-run writes no manifest");
    }

    #[tokio::test]
    async fn enumeration_failure_surfaces_as_catalog_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir(&source).unwrap();
        let config = app_config(source.clone(), dir.path().join("manifests"), false);
        let pipeline = BackupPipeline::initialize(config, reachable_store())
            .await
            .unwrap();

        // Remove the source between initialize and run.
        std::fs::remove_dir(&source).unwrap();
        let err = pipeline.run(false).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Catalog(CatalogError::DirectoryNotFound(_))
        ));
    }
}
