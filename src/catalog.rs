//! File catalog for the backup pipeline: enumerates candidate files under the
//! source directory, renders the backup manifest and prunes directories that
//! the retention phase emptied out.
//!
//! Enumeration is deterministic: regular files only, deduplicated and sorted
//! lexicographically by absolute path, so re-running against an unchanged tree
//! yields the identical sequence (stable manifests, stable test output).

use crate::config::BackupConfig;
use chrono::Local;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("source directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("source path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("failed to walk source directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to write manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A regular file selected for backup, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CatalogEntry {
    pub path: PathBuf,
}

impl CatalogEntry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

pub struct FileCatalog {
    config: BackupConfig,
}

impl FileCatalog {
    pub fn new(config: BackupConfig) -> Self {
        Self { config }
    }

    /// Recursively walks the source directory and returns every regular file
    /// whose base name matches the configured extension patterns, in
    /// lexicographic path order. Symlinks and other non-regular files are
    /// skipped; symlinked directories are not followed.
    pub fn enumerate(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let root = &self.config.source_directory;
        if !root.exists() {
            return Err(CatalogError::DirectoryNotFound(root.clone()));
        }
        if !root.is_dir() {
            return Err(CatalogError::NotADirectory(root.clone()));
        }

        let matcher = build_matcher(&self.config.file_extensions)?;
        // BTreeSet gives dedup and lexicographic order in one pass.
        let mut selected: BTreeSet<PathBuf> = BTreeSet::new();

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let included = match &matcher {
                Some(set) => set.is_match(Path::new(entry.file_name())),
                None => true,
            };
            if included {
                selected.insert(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "Skipping file: no pattern match");
            }
        }

        info!(count = selected.len(), source = %root.display(), "Enumerated files for backup");
        Ok(selected.into_iter().map(CatalogEntry::new).collect())
    }

    /// Writes a human-readable manifest of the given entries. When no output
    /// path is given, the manifest lands in the configured manifest directory
    /// under a timestamp-derived filename. The directory is created if absent;
    /// any write failure is a hard error for this phase.
    pub fn write_manifest(
        &self,
        entries: &[CatalogEntry],
        output_path: Option<PathBuf>,
    ) -> Result<PathBuf, CatalogError> {
        let manifest_path = match output_path {
            Some(path) => path,
            None => {
                let timestamp = Local::now().format("%Y%m%d_%H%M%S");
                self.config
                    .manifest_dir
                    .join(format!("backup_manifest_{timestamp}.txt"))
            }
        };

        if let Some(parent) = manifest_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CatalogError::ManifestWrite {
                    path: manifest_path.clone(),
                    source: e,
                })?;
            }
        }

        let render = |out: &mut Vec<u8>| -> std::io::Result<()> {
            writeln!(out, "# Backup Manifest - {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
            writeln!(out, "# Source directory: {}", self.config.source_directory.display())?;
            writeln!(out, "# Total files: {}", entries.len())?;
            writeln!(out)?;

            let mut total_size: u64 = 0;
            for entry in entries {
                match fs::metadata(&entry.path) {
                    Ok(meta) => {
                        total_size += meta.len();
                        writeln!(out, "{} ({})", entry.path.display(), human_size(meta.len()))?;
                    }
                    Err(e) => {
                        writeln!(out, "{} (ERROR: {e})", entry.path.display())?;
                    }
                }
            }

            writeln!(out)?;
            writeln!(out, "# Total size: {}", human_size(total_size))?;
            Ok(())
        };

        let mut contents = Vec::new();
        render(&mut contents).map_err(|e| CatalogError::ManifestWrite {
            path: manifest_path.clone(),
            source: e,
        })?;
        fs::write(&manifest_path, contents).map_err(|e| CatalogError::ManifestWrite {
            path: manifest_path.clone(),
            source: e,
        })?;

        info!(manifest = %manifest_path.display(), files = entries.len(), "Manifest written");
        Ok(manifest_path)
    }

    /// Removes directories left empty by the retention phase. No-op unless
    /// delete-after-upload is configured. Directories are visited children
    /// before parents (reverse lexicographic order), so a parent is only
    /// considered after its descendants had a chance to empty out. Removal
    /// failure means the directory is not empty and is silently skipped.
    pub fn prune_empty_dirs(&self) -> usize {
        if !self.config.delete_after_upload {
            return 0;
        }

        let root = &self.config.source_directory;
        let mut dirs: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() && e.path() != root)
            .map(|e| e.into_path())
            .collect();
        dirs.sort();
        dirs.reverse();

        let mut removed = 0;
        for dir in dirs {
            match fs::remove_dir(&dir) {
                Ok(()) => {
                    debug!(dir = %dir.display(), "Removed empty directory");
                    removed += 1;
                }
                Err(_) => continue,
            }
        }

        if removed > 0 {
            info!(removed, "Removed empty directories");
        }
        removed
    }
}

/// Compiles the configured extension patterns into a case-insensitive glob
/// set matched against file base names. Returns `None` when everything
/// matches (empty set, or exactly the `*` wildcard). Patterns are normalized
/// to suffix globs: `.txt` and `*.txt` are equivalent.
fn build_matcher(patterns: &[String]) -> Result<Option<GlobSet>, CatalogError> {
    if patterns.is_empty() || patterns == ["*"] {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let normalized = if pattern.starts_with('*') {
            pattern.clone()
        } else {
            format!("*{pattern}")
        };
        let glob = GlobBuilder::new(&normalized)
            .case_insensitive(true)
            .build()
            .map_err(|e| CatalogError::Pattern {
                pattern: pattern.clone(),
                source: e,
            })?;
        builder.add(glob);
    }

    let set = builder.build().map_err(|e| CatalogError::Pattern {
        pattern: patterns.join(", "),
        source: e,
    })?;
    Ok(Some(set))
}

/// Formats a byte count with one decimal place, e.g. `500.0 B`, `2.0 KB`.
pub fn human_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}
