use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

#[allow(deprecated)]
fn get_harvester_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("harvester")
}

fn columns(home: &Path) -> Command {
    let mut cmd = Command::new(get_harvester_bin());
    cmd.env("HARVESTER_HOME", home).arg("columns");
    cmd
}

#[test]
fn test_columns_help() {
    let mut cmd = Command::new(get_harvester_bin());
    cmd.arg("columns").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Manage export column names"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("clear"));
}

#[test]
fn test_columns_list_empty() {
    let temp_dir = tempfile::tempdir().unwrap();

    columns(temp_dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No column names set"));
}

#[test]
fn test_columns_set_list_remove() {
    let temp_dir = tempfile::tempdir().unwrap();

    columns(temp_dir.path())
        .args(["set", "Column_1_Text", "Name"])
        .assert()
        .success();
    columns(temp_dir.path())
        .args(["set", "Website", "Company Site"])
        .assert()
        .success();

    assert!(temp_dir.path().join("settings.json").exists());

    columns(temp_dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Column_1_Text → Name"))
        .stdout(predicate::str::contains("Website → Company Site"));

    columns(temp_dir.path())
        .args(["remove", "Website"])
        .assert()
        .success();

    columns(temp_dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Column_1_Text → Name"))
        .stdout(predicate::str::contains("Website").not());
}

#[test]
fn test_columns_remove_unknown_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    columns(temp_dir.path())
        .args(["remove", "Column_9_Text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No column name set"));
}

#[test]
fn test_columns_clear() {
    let temp_dir = tempfile::tempdir().unwrap();

    columns(temp_dir.path())
        .args(["set", "Column_1_Text", "Name"])
        .assert()
        .success();
    columns(temp_dir.path()).arg("clear").assert().success();

    columns(temp_dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No column names set"));
}
