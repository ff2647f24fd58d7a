//! Basic CLI tests.
//!
//! Tests invoke CLI commands via cargo run and verify the surface parses;
//! commands that mutate state are exercised against the dev data
//! directory via REPGUARD_ENV.

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "repguard-cli", "--"])
        .args(args)
        .env("REPGUARD_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_top_level_help() {
    let (stdout, _stderr, code) = run_cli(&["--help"]);
    assert_eq!(code, 0, "Top-level help failed");
    assert!(stdout.contains("contract"));
    assert!(stdout.contains("reminder"));
    assert!(stdout.contains("alert"));
}

#[test]
fn test_contract_help() {
    let (stdout, _stderr, code) = run_cli(&["contract", "--help"]);
    assert_eq!(code, 0, "Contract help failed");
    assert!(stdout.contains("create"));
    assert!(stdout.contains("renew"));
    assert!(stdout.contains("mark-breached"));
}

#[test]
fn test_reminder_help() {
    let (stdout, _stderr, code) = run_cli(&["reminder", "--help"]);
    assert_eq!(code, 0, "Reminder help failed");
    assert!(stdout.contains("setup-all"));
    assert!(stdout.contains("process"));
}

#[test]
fn test_config_path() {
    let (stdout, _stderr, code) = run_cli(&["config", "path"]);
    assert_eq!(code, 0, "Config path failed");
    assert!(stdout.contains("config.toml"));
}

#[test]
fn test_unknown_side_is_rejected() {
    let (_stdout, stderr, code) = run_cli(&[
        "evidence",
        "record",
        "--client",
        "client-x",
        "--transaction",
        "tx-x",
        "--date",
        "2026-01-15",
        "--side",
        "swap",
        "--property",
        "lot-1",
    ]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown transaction side"));
}
