//! End-to-end tests of the `annotator-update` binary.
//!
//! None of these reach the network: they either fail before the check, are
//! rate limited, or point the API at a closed loopback port.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let root = dir.join("annotator");
    fs::create_dir_all(root.join("app")).unwrap();
    fs::write(root.join("app").join("pixi.toml"), "[project]\n").unwrap();

    let config = dir.join("updater.toml");
    fs::write(
        &config,
        format!(
            "owner = \"OrthoDriven\"\nrepository = \"2d-point-annotator\"\nbranch = \"main\"\ninstall_root = \"{}\"\n{extra}",
            root.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();
    config
}

fn write_state(dir: &Path, last_check: &str) {
    fs::write(
        dir.join("annotator").join("update_state.json"),
        format!(
            r#"{{"sha": "abc123", "etag": "\"etag1\"", "updatedUtc": "2025-01-01T00:00:00Z", "lastCheckUtc": "{last_check}"}}"#
        ),
    )
    .unwrap();
}

fn updater() -> Command {
    let mut cmd = Command::cargo_bin("annotator-update").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("ANNOTATOR_UPDATER_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_missing_settings_exit_with_config_error() {
    let temp = TempDir::new().unwrap();

    updater()
        .arg("--config")
        .arg(temp.path().join("updater.toml"))
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("owner"));
}

#[test]
fn test_malformed_settings_exit_with_config_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("updater.toml");
    fs::write(&config, "owner = [").unwrap();

    updater().arg("--config").arg(&config).arg("status").assert().code(2);
}

#[test]
fn test_status_shows_persisted_revision() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");
    write_state(temp.path(), "2025-01-01T00:00:00Z");

    updater()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("abc123"))
        .stdout(predicate::str::contains("OrthoDriven/2d-point-annotator@main"))
        .stdout(predicate::str::contains("Next check:   due"));
}

#[test]
fn test_status_json_uses_state_file_field_names() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");
    write_state(temp.path(), "2025-01-01T00:00:00Z");

    let output = updater()
        .args(["--quiet", "status", "--json"])
        .env("ANNOTATOR_UPDATER_CONFIG", &config)
        .output()
        .unwrap();

    assert!(output.status.success());
    let state: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(state["sha"], "abc123");
    assert_eq!(state["etag"], "\"etag1\"");
}

#[test]
fn test_run_is_rate_limited_after_recent_check() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "min_check_interval_secs = 3600\n");
    write_state(temp.path(), &chrono::Utc::now().to_rfc3339());

    updater()
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("next check in"));
}

#[test]
fn test_unreachable_api_is_check_failure() {
    let temp = TempDir::new().unwrap();
    let config = write_config(
        temp.path(),
        "api_base_url = \"http://127.0.0.1:9\"\nrequest_timeout_secs = 2\n",
    );
    write_state(temp.path(), "2025-01-01T00:00:00Z");

    updater().arg("--config").arg(&config).args(["run", "--force"]).assert().code(3);

    // The attempt is recorded even though it failed
    let state = fs::read_to_string(temp.path().join("annotator").join("update_state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(state["sha"], "abc123");
    assert_ne!(state["lastCheckUtc"], "2025-01-01T00:00:00Z");
}

#[test]
fn test_cli_overrides_settings_file() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");
    write_state(temp.path(), "2025-01-01T00:00:00Z");

    updater()
        .arg("--config")
        .arg(&config)
        .args(["--branch", "develop", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@develop"));
}
