//! Smoke tests for the `kiln` binary.
//!
//! Runs against `provider = "stub"` config files, so no platform account or
//! network access is needed.

use std::path::PathBuf;
use std::process::{Command, Output};

fn kiln() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kiln"));
    cmd.env_remove("KILN_TOKEN");
    cmd
}

const STUB_CONFIG: &str = r#"
[platform]
provider = "stub"

[[stub.environments]]
name = "python-default-env"
title = "Python"
burning_rate = 10.0
language = "python"

[[stub.environments]]
name = "python-gpu-env"
burning_rate = 120.0

[[stub.snapshots]]
uid = "snapshot-001"
name = "nightly"
environment = "python-default-env"
"#;

fn stub_config(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, STUB_CONFIG).unwrap();
    path
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "kiln should exit 0\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ── Help / basic CLI ──────────────────────────────────────────────────────────

#[test]
fn binary_responds_to_help() {
    let output = kiln().arg("--help").output().expect("failed to execute kiln");
    assert!(output.status.success(), "kiln --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["envs", "runtimes", "snapshots", "budget"] {
        assert!(stdout.contains(sub), "help output should list {sub}");
    }
}

#[test]
fn runtimes_subcommand_help() {
    let output = kiln()
        .args(["runtimes", "--help"])
        .output()
        .expect("failed to execute kiln runtimes --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ensure"));
    assert!(stdout.contains("terminate-all"));
}

// ── Budget (offline) ──────────────────────────────────────────────────────────

#[test]
fn budget_credits_rounds_up() {
    let output = kiln()
        .args(["budget", "credits", "--minutes", "7", "--rate", "10"])
        .output()
        .unwrap();
    assert_eq!(json(&output)["credits"], 2);
}

#[test]
fn budget_minutes_rounds_down() {
    let output = kiln()
        .args(["budget", "minutes", "--credits", "2", "--rate", "10"])
        .output()
        .unwrap();
    assert_eq!(json(&output)["minutes"], 12);
}

// ── Stub provider ─────────────────────────────────────────────────────────────

#[test]
fn envs_lists_stub_environments() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = stub_config(&dir);

    let output = kiln()
        .arg("--config")
        .arg(&config)
        .arg("envs")
        .output()
        .unwrap();

    let envs = json(&output);
    assert_eq!(envs[0]["name"], "python-default-env");
    assert_eq!(envs[1]["burning_rate"], 120.0);
}

#[test]
fn ensure_creates_runtime_in_default_environment() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = stub_config(&dir);

    let output = kiln()
        .arg("--config")
        .arg(&config)
        .args(["runtimes", "ensure", "--credits", "50", "--type", "terminal"])
        .output()
        .unwrap();

    let runtime = json(&output);
    assert_eq!(runtime["environment_name"], "python-default-env");
    assert_eq!(runtime["state"], "starting");
    assert_eq!(runtime["type"], "terminal");
    assert_eq!(runtime["credits"], 50.0);
}

#[test]
fn restore_into_override_environment() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = stub_config(&dir);

    let output = kiln()
        .arg("--config")
        .arg(&config)
        .args([
            "snapshots",
            "restore",
            "snapshot-001",
            "--env",
            "python-gpu-env",
            "--minutes",
            "30",
        ])
        .output()
        .unwrap();

    let runtime = json(&output);
    assert_eq!(runtime["environment_name"], "python-gpu-env");
    assert_eq!(runtime["credits"], 60.0);
}

#[test]
fn unknown_environment_fails_with_known_names() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = stub_config(&dir);

    let output = kiln()
        .arg("--config")
        .arg(&config)
        .args(["runtimes", "ensure", "--env", "python-tpu-env"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("python-tpu-env"), "stderr: {stderr}");
    assert!(stderr.contains("python-default-env"), "stderr: {stderr}");
}

#[test]
fn http_provider_without_token_fails_cleanly() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[platform]\nprovider = \"http\"\n").unwrap();

    let output = kiln()
        .arg("--config")
        .arg(&path)
        .args(["runtimes", "list"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("KILN_TOKEN"), "stderr: {stderr}");
}
