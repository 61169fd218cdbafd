//! Integration tests for `pcomposer validate`.

use std::fs;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run_validate(manifest: Option<&str>, json: bool) -> Output {
    let dir = tempdir().unwrap();
    if let Some(content) = manifest {
        fs::write(dir.path().join("composer.json"), content).unwrap();
    }

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pcomposer"));
    cmd.arg("validate").arg("--cwd").arg(dir.path());
    if json {
        cmd.arg("--json");
    }
    cmd.env("PCOMPOSER_STORE_DIR", dir.path().join("store"))
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run pcomposer validate")
}

#[test]
fn test_validate_valid_manifest() {
    let output = run_validate(Some(r#"{"name": "acme/app", "require": {}}"#), false);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("composer.json is valid"), "stdout: {stdout}");
}

#[test]
fn test_validate_invalid_manifest_json() {
    let output = run_validate(Some(r#"{"name": "Acme", "autoload": "src/"}"#), true);
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "PKG_MANIFEST_INVALID");
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.contains("Invalid package name format"), "{message}");
    assert!(message.contains("Invalid 'autoload' section"), "{message}");
}

#[test]
fn test_validate_invalid_manifest_human() {
    let output = run_validate(Some(r#"{"require": 1}"#), false);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Missing 'name' field"), "stderr: {stderr}");
}

#[test]
fn test_validate_without_manifest() {
    let output = run_validate(None, true);
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["error"]["code"], "PKG_MANIFEST_MISSING");
}
