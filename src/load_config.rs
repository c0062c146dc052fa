//! Loads and validates the YAML configuration, injecting secrets from the
//! environment. This is the only place where untrusted YAML is parsed and
//! mapped to the strongly-typed [`AppConfig`] consumed by the pipeline.
//!
//! Environment overrides (applied after the file is parsed):
//! - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_DEFAULT_REGION`
//! - `S3_BUCKET_NAME`
//!
//! All errors use `anyhow::Error` for context-rich diagnostics and are
//! surfaced at the CLI boundary.

use crate::config::{AppConfig, AwsConfig, BackupConfig, LoggingConfig, S3Config};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Loads a YAML config file, applies environment overrides and validates the
/// result. The returned config carries an absolute, existing source directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}. Use --create-config to generate a template.",
                path_ref,
                e
            ));
        }
    };

    let mut config: AppConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    apply_env_overrides(&mut config);
    validate(&mut config)?;
    config.trace_loaded();
    Ok(config)
}

/// Environment variables take precedence over values in the file, so
/// credentials never have to live on disk.
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(access_key) = std::env::var("AWS_ACCESS_KEY_ID") {
        config.aws.access_key_id = access_key;
    }
    if let Ok(secret_key) = std::env::var("AWS_SECRET_ACCESS_KEY") {
        config.aws.secret_access_key = secret_key;
    }
    if let Ok(region) = std::env::var("AWS_DEFAULT_REGION") {
        config.aws.region = region;
    }
    if let Ok(bucket) = std::env::var("S3_BUCKET_NAME") {
        config.s3.bucket_name = bucket;
    }
}

fn validate(config: &mut AppConfig) -> Result<()> {
    if config.aws.access_key_id.trim().is_empty() {
        anyhow::bail!("AWS access_key_id must not be empty");
    }
    if config.aws.secret_access_key.trim().is_empty() {
        anyhow::bail!("AWS secret_access_key must not be empty");
    }
    config.s3.bucket_name = config.s3.bucket_name.trim().to_string();
    if config.s3.bucket_name.is_empty() {
        anyhow::bail!("S3 bucket_name must not be empty");
    }

    let source = &config.backup.source_directory;
    if !source.exists() {
        anyhow::bail!("Source directory does not exist: {}", source.display());
    }
    if !source.is_dir() {
        anyhow::bail!("Source path is not a directory: {}", source.display());
    }
    // Canonicalize so the retention phase can compare resolved paths against it.
    config.backup.source_directory = source.canonicalize().map_err(|e| {
        anyhow::anyhow!("Failed to resolve source directory {}: {e}", source.display())
    })?;

    let level = config.logging.level.to_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => config.logging.level = level,
        other => anyhow::bail!("Invalid logging level '{other}'. Use: trace, debug, info, warn, error"),
    }

    Ok(())
}

/// Writes a sample configuration file for operators to fill in. Refuses to
/// overwrite an existing file.
pub fn create_sample_config<P: AsRef<Path>>(output_path: P) -> Result<PathBuf> {
    let path_ref = output_path.as_ref();
    if path_ref.exists() {
        anyhow::bail!("Refusing to overwrite existing config file: {}", path_ref.display());
    }

    let sample = AppConfig {
        aws: AwsConfig {
            access_key_id: "your_access_key_here".to_string(),
            secret_access_key: "your_secret_key_here".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
        },
        s3: S3Config {
            bucket_name: "your-backup-bucket".to_string(),
            prefix: "backups".to_string(),
        },
        backup: BackupConfig {
            source_directory: PathBuf::from("/path/to/backup"),
            file_extensions: vec!["*.txt".to_string(), "*.pdf".to_string(), "*.docx".to_string()],
            delete_after_upload: false,
            manifest_dir: PathBuf::from("manifests"),
        },
        logging: LoggingConfig::default(),
    };

    let yaml = serde_yaml::to_string(&sample)?;
    fs::write(path_ref, yaml)
        .map_err(|e| anyhow::anyhow!("Failed to write sample config {:?}: {e}", path_ref))?;
    info!(config_path = ?path_ref, "Sample configuration written");
    Ok(path_ref.to_path_buf())
}
