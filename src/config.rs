use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// AWS credential and region settings for the store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (e.g. MinIO). Real S3 when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Destination bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    /// Key prefix for organising objects in the bucket. Slashes are trimmed
    /// during key derivation, so `backups/` and `backups` are equivalent.
    #[serde(default)]
    pub prefix: String,
}

/// What to back up and how to treat local copies afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub source_directory: PathBuf,
    #[serde(default = "default_extensions")]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub delete_after_upload: bool,
    /// Where backup manifests are written when no explicit path is given.
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,
}

fn default_extensions() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from("manifests")
}

/// Logging settings for the rotating file sink and level filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub file_name_prefix: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_prefix() -> String {
    "backup.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            file_name_prefix: default_log_prefix(),
        }
    }
}

/// Fully validated application configuration, immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub aws: AwsConfig,
    pub s3: S3Config,
    pub backup: BackupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            source_directory = %self.backup.source_directory.display(),
            bucket = %self.s3.bucket_name,
            prefix = %self.s3.prefix,
            delete_after_upload = self.backup.delete_after_upload,
            "Loaded AppConfig"
        );
        debug!(extensions = ?self.backup.file_extensions, "Configured file extension patterns");
    }
}
