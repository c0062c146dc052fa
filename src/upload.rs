//! Upload phase: pushes every catalogued file to the bucket, strictly in
//! order, verifying each transfer by size comparison before counting it a
//! success. One file's failure never aborts the batch; every entry produces
//! exactly one recorded outcome.

use crate::catalog::CatalogEntry;
use crate::pipeline::RunResult;
use crate::store::{BucketStore, StoreError};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info};

/// Classified per-file upload failure. Recorded, never fatal to the batch.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("local file missing or unreadable: {0}")]
    LocalFile(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("size mismatch after upload: local {expected} bytes, remote {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Outcome of one attempted upload.
#[derive(Debug)]
pub enum UploadOutcome {
    Success { remote_key: String },
    Failure { error: UploadError },
}

/// Uploads all entries sequentially, recording one outcome per entry into
/// `results`. In dry-run mode every file is recorded as successful without
/// touching the store.
pub async fn upload_all<S: BucketStore>(
    store: &S,
    key_prefix: &str,
    entries: &[CatalogEntry],
    dry_run: bool,
    results: &mut RunResult,
) {
    let total = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        info!(file = %entry.path.display(), index = i + 1, total, "Processing file");

        if dry_run {
            let key = derive_object_key(key_prefix, &entry.path);
            info!(file = %entry.path.display(), key = %key, "[DRY-RUN] Simulating upload");
            results.record_upload(&entry.path, UploadOutcome::Success { remote_key: key });
            continue;
        }

        match upload_one(store, key_prefix, &entry.path).await {
            Ok(key) => {
                info!(file = %entry.path.display(), key = %key, "Upload succeeded");
                results.record_upload(&entry.path, UploadOutcome::Success { remote_key: key });
            }
            Err(e) => {
                error!(file = %entry.path.display(), error = %e, "Upload failed");
                results.record_upload(&entry.path, UploadOutcome::Failure { error: e });
            }
        }
    }
}

/// Uploads a single file and verifies the remote object's size against the
/// local file. A mismatch is a failure even though the transfer succeeded:
/// size equality is the correctness contract against truncation.
async fn upload_one<S: BucketStore>(
    store: &S,
    key_prefix: &str,
    path: &Path,
) -> Result<String, UploadError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| UploadError::LocalFile(format!("{}: {e}", path.display())))?;
    if !meta.is_file() {
        return Err(UploadError::LocalFile(format!(
            "{}: not a regular file",
            path.display()
        )));
    }
    let local_size = meta.len();
    debug!(file = %path.display(), size = local_size, "Read local file metadata");

    let key = derive_object_key(key_prefix, path);
    store.put_object(path, &key).await?;

    let remote = store.head_object(&key).await?;
    if remote.size != local_size {
        return Err(UploadError::SizeMismatch {
            expected: local_size,
            actual: remote.size,
        });
    }
    debug!(key = %key, size = remote.size, "Upload verified");
    Ok(key)
}

/// Derives the object key for a local file: the base name with spaces
/// replaced by underscores, joined to the prefix (trimmed of slashes).
pub fn derive_object_key(prefix: &str, path: &Path) -> String {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().replace(' ', "_"))
        .unwrap_or_default();

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        filename
    } else {
        format!("{prefix}/{filename}")
    }
}
