use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn create_config_writes_a_sample_and_exits_zero() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.yaml");

    let mut cmd = Command::cargo_bin("s3-backup").expect("binary exists");
    cmd.arg("--create-config")
        .arg("--config")
        .arg(&config_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Sample configuration written"));

    let content = std::fs::read_to_string(&config_path).expect("sample file exists");
    assert!(content.contains("bucket_name"));
    assert!(content.contains("source_directory"));
}

#[test]
fn create_config_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "existing: true\n").unwrap();

    let mut cmd = Command::cargo_bin("s3-backup").expect("binary exists");
    cmd.arg("--create-config")
        .arg("--config")
        .arg(&config_path);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("overwrite"));

    assert_eq!(
        std::fs::read_to_string(&config_path).unwrap(),
        "existing: true\n"
    );
}

#[test]
fn missing_config_file_exits_one_with_hint() {
    let dir = TempDir::new().expect("temp dir");

    let mut cmd = Command::cargo_bin("s3-backup").expect("binary exists");
    cmd.arg("--config").arg(dir.path().join("absent.yaml"));
    // Keep host credentials from leaking into the run.
    cmd.env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("S3_BUCKET_NAME");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--create-config"));
}

#[test]
fn invalid_config_exits_one() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "not-yaml: [:::").unwrap();

    let mut cmd = Command::cargo_bin("s3-backup").expect("binary exists");
    cmd.arg("--config").arg(&config_path);

    cmd.assert().failure().code(1);
}

#[test]
fn help_documents_the_flags() {
    let mut cmd = Command::cargo_bin("s3-backup").expect("binary exists");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--create-config"))
        .stdout(predicate::str::contains("--status"))
        .stdout(predicate::str::contains("--output-json"));
}
