#![allow(deprecated)] // Command::cargo_bin: the macro alternative requires a same-package binary

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

// Hermetic command: ambient env vars that would change behavior are removed.
fn rollcall_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rollcall").unwrap();
    cmd.env_remove("ROLLCALL_BACKEND_URL")
        .env_remove("ROLLCALL_SYNC_TAG")
        .env_remove("ROLLCALL_SYNC_TIMEOUT_SECS")
        .env_remove("ROLLCALL_BIND_ADDR")
        .env("ROLLCALL_DATA_DIR", data_dir.path());
    cmd
}

#[test]
fn pending_on_fresh_store_is_empty() {
    let tmp = TempDir::new().unwrap();
    let output = rollcall_cmd(&tmp).arg("pending").output().unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records, serde_json::json!([]));
}

#[test]
fn record_then_pending_lists_it() {
    let tmp = TempDir::new().unwrap();
    rollcall_cmd(&tmp)
        .args([
            "record", "--user-id", "42", "--role", "Student", "--lat", "-33.86", "--lon", "151.2",
        ])
        .assert()
        .success()
        .stdout(contains("1"));

    let output = rollcall_cmd(&tmp).arg("pending").output().unwrap();
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records[0]["key"], 1);
    assert_eq!(records[0]["value"]["userId"], 42);
    assert_eq!(records[0]["value"]["role"], "Student");
    assert_eq!(records[0]["value"]["lat"], -33.86);
}

#[test]
fn record_rejects_invalid_geolocation() {
    let tmp = TempDir::new().unwrap();
    rollcall_cmd(&tmp)
        .args([
            "record", "--user-id", "1", "--role", "Teacher", "--lat", "95", "--lon", "0",
        ])
        .assert()
        .failure()
        .stderr(contains("InvalidGeolocation"));
}

#[test]
fn record_rejects_unknown_role() {
    let tmp = TempDir::new().unwrap();
    rollcall_cmd(&tmp)
        .args(["record", "--user-id", "1", "--role", "Admin", "--lat", "0", "--lon", "0"])
        .assert()
        .failure()
        .stderr(contains("Invalid role"));
}

#[test]
fn sync_requires_backend_url() {
    let tmp = TempDir::new().unwrap();
    rollcall_cmd(&tmp)
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("ROLLCALL_BACKEND_URL"));
}

#[test]
fn sync_with_empty_store_needs_no_network() {
    let tmp = TempDir::new().unwrap();
    rollcall_cmd(&tmp)
        .env("ROLLCALL_BACKEND_URL", "http://127.0.0.1:1")
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("nothing_to_sync"));
}

#[test]
fn sync_failure_exits_non_zero_and_keeps_records() {
    let tmp = TempDir::new().unwrap();
    rollcall_cmd(&tmp)
        .args(["record", "--user-id", "7", "--role", "Teacher", "--lat", "10", "--lon", "20"])
        .assert()
        .success();

    rollcall_cmd(&tmp)
        .env("ROLLCALL_BACKEND_URL", "http://127.0.0.1:1")
        .arg("sync")
        .assert()
        .failure();

    let output = rollcall_cmd(&tmp).arg("pending").output().unwrap();
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
}

#[test]
fn record_refuses_student_on_holiday() {
    let tmp = TempDir::new().unwrap();
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    std::fs::write(
        tmp.path().join("calendar.json"),
        serde_json::to_vec(&serde_json::json!({ "holidays": [today] })).unwrap(),
    )
    .unwrap();

    rollcall_cmd(&tmp)
        .args(["record", "--user-id", "1", "--role", "Student", "--lat", "0", "--lon", "0"])
        .assert()
        .failure()
        .stderr(contains("HolidayWithoutClass"));

    rollcall_cmd(&tmp)
        .args(["record", "--user-id", "2", "--role", "Teacher", "--lat", "0", "--lon", "0"])
        .assert()
        .success();
}
