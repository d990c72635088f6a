//! Corruption recovery tests for the pillbox binary.
//!
//! These tests verify the system handles:
//! - Corrupted cabinet files without overwriting them
//! - Invalid schedule data
//! - Missing files and directories

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pillbox").expect("Failed to find pillbox binary");
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .arg("--data-dir")
        .arg(home.join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_corrupted_cabinet_is_reported_and_preserved() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let cabinet_path = data_dir.join("cabinet.json");
    fs::write(&cabinet_path, "{ invalid json }}}}").expect("Failed to write corrupted cabinet");

    cli(temp_dir.path()).arg("status").assert().failure();

    // A write must not replace the damaged file with an empty cabinet
    cli(temp_dir.path())
        .args(["add", "Aspirin", "--stock", "10"])
        .assert()
        .failure();

    assert_eq!(
        fs::read_to_string(&cabinet_path).unwrap(),
        "{ invalid json }}}}"
    );
}

#[test]
fn test_out_of_range_weekday_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");

    cli(temp_dir.path())
        .args(["add", "Aspirin", "--stock", "10", "--dose", "08:00@mon"])
        .assert()
        .success();

    let cabinet_path = data_dir.join("cabinet.json");
    let text = fs::read_to_string(&cabinet_path).unwrap();
    let mut json: serde_json::Value = serde_json::from_str(&text).unwrap();
    json["medications"][0]["doses"][0]["recurrence"] = serde_json::json!([1, 7]);
    fs::write(&cabinet_path, json.to_string()).unwrap();

    cli(temp_dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside 0..=6"));
}

#[test]
fn test_bad_weekday_in_dose_spec() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["add", "Aspirin", "--stock", "10", "--dose", "08:00@funday"])
        .assert()
        .failure();

    cli(temp_dir.path())
        .args(["add", "Aspirin", "--stock", "10", "--dose", "08:00@9"])
        .assert()
        .failure();
}

#[test]
fn test_missing_data_dir_is_created() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    assert!(!data_dir.exists());

    cli(temp_dir.path())
        .args(["add", "Aspirin", "--stock", "10"])
        .assert()
        .success();

    assert!(data_dir.join("cabinet.json").exists());
}

#[test]
fn test_invalid_now_is_rejected() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["--now", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --now"));
}
