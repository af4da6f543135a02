//! E2E CLI tests in demo mode:
//! - `tb get` pretty and JSON output, unknown keys
//! - first-run config creation
//! - `tb run` refusing to start without its selector
//! - the hidden `_rpc` callbacks outside a selector
//! - shell completions
//!
//! Each test runs `tb` as a subprocess with its config in a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn config_path(dir: &Path) -> PathBuf {
    dir.join("config.toml")
}

/// Build a Command targeting the tb binary with an isolated config file.
fn tb_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tb"));
    cmd.current_dir(dir);
    cmd.arg("--config").arg(config_path(dir));
    cmd.env("TICKETBENCH_LOG", "error");
    cmd.env_remove("TICKETBENCH_RPC_ADDR");
    cmd
}

// ---------------------------------------------------------------------------
// get
// ---------------------------------------------------------------------------

#[test]
fn get_prints_key_and_summary() {
    let dir = TempDir::new().expect("tempdir");
    tb_cmd(dir.path())
        .args(["--demo", "get", "FOO-100"])
        .assert()
        .success()
        .stdout("FOO-100: fix stuff\n");
}

#[test]
fn get_json_emits_the_record() {
    let dir = TempDir::new().expect("tempdir");
    let output = tb_cmd(dir.path())
        .args(["--demo", "get", "FOO-200", "--json"])
        .output()
        .expect("get should not crash");
    assert!(
        output.status.success(),
        "get failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["key"], "FOO-200");
    assert_eq!(json["id"], "10003");
    assert_eq!(json["labels"], serde_json::json!(["backend", "ops"]));
}

#[test]
fn get_unknown_key_fails_with_code() {
    let dir = TempDir::new().expect("tempdir");
    tb_cmd(dir.path())
        .args(["--demo", "get", "FOO-999"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("E2001"))
        .stderr(predicate::str::contains("FOO-999"));
}

#[test]
fn get_without_server_points_at_demo() {
    let dir = TempDir::new().expect("tempdir");
    tb_cmd(dir.path())
        .args(["get", "FOO-100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--demo"));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn first_run_writes_default_config() {
    let dir = TempDir::new().expect("tempdir");
    tb_cmd(dir.path())
        .args(["--demo", "get", "FOO-100"])
        .assert()
        .success();
    let written = std::fs::read_to_string(config_path(dir.path())).expect("config written");
    assert!(written.contains("[[queries]]"));
    assert!(written.contains("command = \"fzf\""));
}

#[test]
fn broken_config_reports_parse_error() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(config_path(dir.path()), "labels = [").expect("write config");
    tb_cmd(dir.path())
        .args(["--demo", "get", "FOO-100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_requires_the_selector_on_path() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        config_path(dir.path()),
        "[selector]\ncommand = \"tb-no-such-selector\"\n",
    )
    .expect("write config");
    tb_cmd(dir.path())
        .args(["--demo", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3002"))
        .stderr(predicate::str::contains("tb-no-such-selector"));
}

// ---------------------------------------------------------------------------
// _rpc and completions
// ---------------------------------------------------------------------------

#[test]
fn rpc_load_without_session_fails() {
    let dir = TempDir::new().expect("tempdir");
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("free port")
        .port();
    tb_cmd(dir.path())
        .env("TICKETBENCH_RPC_ADDR", format!("127.0.0.1:{port}"))
        .args(["_rpc", "load"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("load_more"));
}

#[test]
fn completions_generate_bash_script() {
    let dir = TempDir::new().expect("tempdir");
    tb_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_tb"));
}
