#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains as str_contains;
use std::path::Path;
use tempfile::{TempDir, tempdir};

const SNAPSHOT: &str = r#"{
  "tasks": [
    { "id": 1, "title": "Release" },
    { "id": 2, "parent_id": 1, "title": "Design", "start_date": "2024-01-01", "duration": 3 },
    { "id": 3, "parent_id": 1, "title": "Build", "predecessor_id": 2, "predecessor_offset": 1, "duration": 4 }
  ]
}"#;

const CYCLIC: &str = r#"{
  "tasks": [
    { "id": 1, "title": "Release" },
    { "id": 2, "parent_id": 1, "title": "A", "predecessor_id": 3, "duration": 1 },
    { "id": 3, "parent_id": 1, "title": "B", "predecessor_id": 2, "duration": 1 }
  ]
}"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

#[allow(deprecated)]
fn gantt() -> Command {
    let mut cmd = Command::cargo_bin("gantt").expect("gantt binary");
    cmd.env_remove("RUST_LOG").env_remove("GANTT_CONFIG");
    cmd
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn resolve_prints_table() {
    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "tasks.json", SNAPSHOT);
    gantt()
        .args(["resolve", arg(&snapshot)])
        .assert()
        .success()
        .stdout(str_contains("| id"))
        .stdout(str_contains("Build"))
        .stdout(str_contains("2024-01-11"));
}

#[test]
fn resolve_writes_csv_file() {
    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "tasks.json", SNAPSHOT);
    let out = dir.path().join("rows.csv");
    gantt()
        .args(["resolve", arg(&snapshot), "--format", "csv", "--output", arg(&out)])
        .assert()
        .success();
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("id,title,kind,depth,start,end"));
    assert!(text.contains("3,Build,ACTIVITY,1,2024-01-05,2024-01-11"));
}

#[test]
fn resolve_json_for_subtree() {
    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "tasks.json", SNAPSHOT);
    let assert = gantt()
        .args(["resolve", arg(&snapshot), "--format", "json", "--root", "2"])
        .assert()
        .success();
    let rows: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["end"], "2024-01-04");
}

#[test]
fn config_calendar_changes_dates() {
    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "tasks.json", SNAPSHOT);
    let config = write(
        &dir,
        "config.json",
        r#"{ "calendar": { "working_days": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"] } }"#,
    );
    gantt()
        .args(["resolve", arg(&snapshot), "--format", "csv", "--config", arg(&config)])
        .assert()
        .success()
        .stdout(str_contains("3,Build,ACTIVITY,1,2024-01-05,2024-01-09"));
}

#[test]
fn cycle_logs_error_but_resolves() {
    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "cyclic.json", CYCLIC);
    gantt()
        .args(["resolve", arg(&snapshot), "--format", "csv"])
        .assert()
        .success()
        .stderr(str_contains("predecessor cycle detected"));
}

#[test]
fn strict_mode_rejects_cycles() {
    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "cyclic.json", CYCLIC);
    gantt()
        .args(["resolve", arg(&snapshot), "--strict"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(str_contains("predecessor cycle"));
}

#[test]
fn check_passes_and_fails() {
    let dir = tempdir().unwrap();
    let good = write(&dir, "tasks.json", SNAPSHOT);
    let bad = write(&dir, "cyclic.json", CYCLIC);
    gantt()
        .args(["check", arg(&good)])
        .assert()
        .success()
        .stdout(str_contains("ok: 1 tree(s) checked"));
    gantt().args(["check", arg(&bad)]).assert().code(2);
}

#[test]
fn invalid_snapshot_reports_error() {
    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "bad.json", r#"{ "tasks": [ { "id": 1, "parent_id": 1 } ] }"#);
    gantt()
        .args(["resolve", arg(&snapshot)])
        .assert()
        .code(1)
        .stderr(str_contains("Error:"));
}

#[test]
fn inverted_dates_warn_unless_strict() {
    let dir = tempdir().unwrap();
    let snapshot = write(
        &dir,
        "inverted.json",
        r#"{ "tasks": [ { "id": 1, "title": "x", "start_date": "2024-03-05", "end_date": "2024-03-01" } ] }"#,
    );
    gantt()
        .args(["resolve", arg(&snapshot), "--format", "csv"])
        .assert()
        .success()
        .stderr(str_contains("task starts after it ends"));
    gantt()
        .args(["resolve", arg(&snapshot), "--strict"])
        .assert()
        .code(1)
        .stderr(str_contains("starts on 2024-03-05 after it ends"));
}

#[test]
fn missing_source_is_an_error() {
    gantt().args(["resolve"]).assert().code(1).stderr(str_contains("no task source"));
}

#[cfg(feature = "sqlite")]
#[test]
fn resolve_from_sqlite_database() {
    use gantt_dates::{SqliteTaskRepository, load_snapshot_from_json};

    let dir = tempdir().unwrap();
    let snapshot = write(&dir, "tasks.json", SNAPSHOT);
    let db = dir.path().join("tasks.db");
    let records = load_snapshot_from_json(&snapshot).unwrap().tasks;
    SqliteTaskRepository::open(&db).unwrap().save_records(&records).unwrap();

    gantt()
        .args(["resolve", "--db", arg(&db), "--format", "csv"])
        .assert()
        .success()
        .stdout(str_contains("3,Build,ACTIVITY,1,2024-01-05,2024-01-11"));
}
