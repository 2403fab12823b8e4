//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

use std::net::TcpListener;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the am2r-connector binary
fn connector_cmd() -> Command {
    let mut cmd = Command::cargo_bin("am2r-connector").unwrap();
    cmd.env_remove("AM2R_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// A loopback port nobody listens on
fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    connector_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("AM2R"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    connector_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("am2r-connector"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_default() {
    connector_cmd()
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[game]"))
        .stdout(predicate::str::contains("port = 64197"))
        .stdout(predicate::str::contains("[server]"))
        .stdout(predicate::str::contains("[logging]"));
}

#[test]
fn test_config_validate_default() {
    connector_cmd()
        .arg("config")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    connector_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/path/config.toml")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_config_init_help() {
    connector_cmd()
        .arg("config")
        .arg("init")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialize"))
        .stdout(predicate::str::contains("--path"))
        .stdout(predicate::str::contains("--force"));
}

// ─────────────────────────────────────────────────────────────────
// Run Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_help() {
    connector_cmd()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--connect"))
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_run_with_missing_config() {
    connector_cmd()
        .arg("run")
        .arg("--config")
        .arg("/nonexistent/config.toml")
        .assert()
        .failure();
}

#[test]
fn test_run_rejects_non_websocket_server() {
    connector_cmd()
        .arg("run")
        .arg("--connect")
        .arg("http://example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("server.url"));
}

#[test]
fn test_run_console_status_then_exit() {
    connector_cmd()
        .arg("-q")
        .arg("run")
        .arg("--port")
        .arg(unused_port().to_string())
        .write_stdin("/am2r\nexit\n")
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Connection Status:"));
}

// ─────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_command() {
    connector_cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    connector_cmd().assert().failure();
}
