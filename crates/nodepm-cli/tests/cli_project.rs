//! Integration tests for the project commands in dry-run mode.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "nodepm-cli", "--bin", "nodepm", "--"]);
    cmd.env_remove("NODEPM_PACKAGE_MANAGER")
        .env_remove("NODEPM_REGISTRY")
        .env_remove("NODEPM_TEMP_DIR");
    cmd
}

/// A repository root with a manifest and an npm lockfile.
fn project(dir: &Path) {
    fs::create_dir(dir.join(".git")).unwrap();
    fs::write(
        dir.join("package.json"),
        r#"{"name":"app","dependencies":{"left-pad":"^1.3.0","missing":"^1.0.0"}}"#,
    )
    .unwrap();
    fs::write(dir.join("package-lock.json"), "{}").unwrap();
}

fn run_json(cwd: &Path, args: &[&str]) -> Value {
    let output = cargo_bin()
        .args(args)
        .args(["--dry-run", "--json", "--cwd"])
        .arg(cwd)
        .output()
        .expect("failed to run nodepm");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("invalid JSON output")
}

#[test]
fn test_version() {
    let output = cargo_bin().arg("version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("nodepm "));
}

#[test]
fn test_add_dry_run_does_not_touch_project() {
    let dir = tempdir().unwrap();
    project(dir.path());
    let before = fs::read_to_string(dir.path().join("package.json")).unwrap();

    let json = run_json(dir.path(), &["add", "react@^18", "--exact", "--dev"]);
    assert_eq!(json["ok"], true);
    assert_eq!(json["manager"], "npm");
    assert_eq!(json["dry_run"], true);

    let after = fs::read_to_string(dir.path().join("package.json")).unwrap();
    assert_eq!(before, after);
    assert!(!dir.path().join("node_modules").exists());
}

#[test]
fn test_install_dry_run() {
    let dir = tempdir().unwrap();
    project(dir.path());

    let json = run_json(dir.path(), &["install", "--force"]);
    assert_eq!(json["ok"], true);
    assert!(!dir.path().join("node_modules").exists());
}

#[test]
fn test_installed_packages() {
    let dir = tempdir().unwrap();
    project(dir.path());
    let left_pad = dir.path().join("node_modules").join("left-pad");
    fs::create_dir_all(&left_pad).unwrap();
    fs::write(
        left_pad.join("package.json"),
        r#"{"name":"left-pad","version":"1.3.0"}"#,
    )
    .unwrap();

    let json = run_json(dir.path(), &["installed"]);
    let packages = json["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0]["name"], "left-pad");
    assert_eq!(packages[0]["version"], "1.3.0");

    let json = run_json(dir.path(), &["installed", "missing"]);
    assert!(json["packages"].as_array().unwrap().is_empty());
}

#[test]
fn test_manifest_of_local_directory() {
    let dir = tempdir().unwrap();
    project(dir.path());
    let lib = dir.path().join("lib");
    fs::create_dir(&lib).unwrap();
    fs::write(
        lib.join("package.json"),
        r#"{"name":"lib","version":"0.2.0","dependencies":{"tslib":"^2"}}"#,
    )
    .unwrap();

    let json = run_json(dir.path(), &["manifest", "./lib"]);
    assert_eq!(json["ok"], true);
    assert_eq!(json["manifest"]["name"], "lib");
    assert_eq!(json["manifest"]["version"], "0.2.0");
    assert_eq!(json["manifest"]["dependencies"]["tslib"], "^2");
}

#[test]
fn test_invalid_specifier_json_error() {
    let dir = tempdir().unwrap();
    project(dir.path());

    let output = cargo_bin()
        .args(["manifest", ".bad-name@1.0.0", "--dry-run", "--json", "--cwd"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], false);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("PM_SPEC_INVALID: "));
}
