//! Retention phase: removes local copies of files that uploaded successfully.
//!
//! Deletion is deliberately paranoid. Even though every path handed to this
//! phase came from the upload phase moments earlier, each one is re-validated
//! before unlinking: it must still exist, still be a regular file, and its
//! resolved path must still sit inside the configured source directory. The
//! containment check defends against symlink or path manipulation pointing a
//! catalogued path outside the backup root between phases.

use crate::config::BackupConfig;
use crate::pipeline::RunResult;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Outcome of one attempted deletion.
#[derive(Debug, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Skipped { reason: String },
    Failed { reason: String },
}

/// Deletes the local copy of every successfully uploaded file, recording one
/// outcome per file into `results`. Dry-run records simulated deletions
/// without touching the filesystem.
pub fn delete_uploaded(
    config: &BackupConfig,
    uploaded_files: &[(String, String)],
    dry_run: bool,
    results: &mut RunResult,
) {
    for (local_path, _remote_key) in uploaded_files {
        if dry_run {
            info!(file = %local_path, "[DRY-RUN] Simulating deletion");
            results.record_deletion(local_path, DeletionOutcome::Deleted);
            continue;
        }

        let outcome = delete_file_safely(config, Path::new(local_path));
        match &outcome {
            DeletionOutcome::Deleted => info!(file = %local_path, "Local file deleted"),
            DeletionOutcome::Skipped { reason } => {
                debug!(file = %local_path, reason = %reason, "Deletion skipped")
            }
            DeletionOutcome::Failed { reason } => {
                warn!(file = %local_path, reason = %reason, "Deletion failed")
            }
        }
        results.record_deletion(local_path, outcome);
    }
}

/// Validates the safety preconditions and unlinks the file. Existence is
/// re-checked after removal; a file that survives its own unlink is reported
/// as a failure.
pub fn delete_file_safely(config: &BackupConfig, path: &Path) -> DeletionOutcome {
    if !path.exists() {
        return DeletionOutcome::Failed {
            reason: format!("file not found for deletion: {}", path.display()),
        };
    }
    if !path.is_file() {
        return DeletionOutcome::Failed {
            reason: format!("path is not a regular file: {}", path.display()),
        };
    }

    // Containment: the resolved path must live under the resolved source root.
    let source_root = match config.source_directory.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            return DeletionOutcome::Failed {
                reason: format!(
                    "cannot resolve source directory {}: {e}",
                    config.source_directory.display()
                ),
            }
        }
    };
    match path.canonicalize() {
        Ok(resolved) if resolved.starts_with(&source_root) => {}
        Ok(resolved) => {
            error!(file = %path.display(), resolved = %resolved.display(), "Refusing to delete file outside source directory");
            return DeletionOutcome::Failed {
                reason: format!("file resolves outside source directory: {}", path.display()),
            };
        }
        Err(e) => {
            return DeletionOutcome::Failed {
                reason: format!("cannot resolve path {}: {e}", path.display()),
            }
        }
    }

    if !config.delete_after_upload {
        return DeletionOutcome::Skipped {
            reason: format!("deletion disabled in configuration: {}", path.display()),
        };
    }

    match fs::remove_file(path) {
        Ok(()) => {
            if path.exists() {
                DeletionOutcome::Failed {
                    reason: format!("file still exists after deletion: {}", path.display()),
                }
            } else {
                DeletionOutcome::Deleted
            }
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => DeletionOutcome::Failed {
            reason: format!("permission denied deleting {}: {e}", path.display()),
        },
        Err(e) => DeletionOutcome::Failed {
            reason: format!("os error deleting {}: {e}", path.display()),
        },
    }
}
