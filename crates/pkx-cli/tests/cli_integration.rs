//! CLI subprocess integration tests.
//!
//! These tests invoke the `pkx` binary against a throwaway project with a
//! local package repository and check exit codes, files, and JSON output.

use std::path::Path;
use std::process::Command;

fn pkx_bin(project: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pkx"));
    // Keep the developer's config out of the tests.
    cmd.env("PKX_CONFIG", project.join("no-such-config.toml"));
    cmd.arg("--project").arg(project);
    cmd
}

fn write_package(dir: &Path, id: &str, main: &str, deps: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    let deps = serde_json::to_string(deps).unwrap();
    std::fs::write(
        dir.join("package.json"),
        format!(r#"{{"id": "{id}", "main": "{main}", "version": "1.0.0", "title": "{id} title", "dependencies": {deps}}}"#),
    )
    .unwrap();
    std::fs::write(dir.join(main), format!("// {id}\n")).unwrap();
}

/// A project depending on `acme.widgets`, which needs strings and math.
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let repo = root.join("repository");
    write_package(&repo.join("acme.util.strings"), "acme.util.strings", "strings.js", &[]);
    write_package(
        &repo.join("acme.util.math"),
        "acme.util.math",
        "math.js",
        &["acme.util.strings"],
    );
    write_package(
        &repo.join("acme.widgets"),
        "acme.widgets",
        "widgets.js",
        &["acme.util.strings", "acme.util.math"],
    );
    std::fs::write(
        root.join("package.json"),
        r#"{"id": "acme.app", "main": "app.js", "version": "0.1.0", "dependencies": ["acme.widgets"]}"#,
    )
    .unwrap();
    std::fs::write(root.join("app.js"), "// app\n").unwrap();
    dir
}

#[test]
fn cli_version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = pkx_bin(dir.path()).arg("--version").output().unwrap();
    assert!(output.status.success(), "pkx --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pkx"), "version output must contain 'pkx': {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = pkx_bin(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["wrap", "info", "build", "clone", "install-hook"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn cli_wrap_project_dependencies() {
    let dir = project();
    let output = pkx_bin(dir.path())
        .args(["wrap", "--output", "bin", "--loader", "loader.js", "--appcache", "app.appcache"])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "wrap must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let listed: Vec<&str> = stdout
        .lines()
        .skip_while(|l| !l.starts_with("Order for including:"))
        .skip(1)
        .take(3)
        .map(str::trim)
        .collect();
    assert_eq!(
        listed,
        vec![
            "acme.util.strings/strings.js",
            "acme.util.math/math.js",
            "acme.widgets/widgets.js",
        ]
    );
    let bin = dir.path().join("bin");
    assert!(bin.join("acme.widgets/widgets.js").is_file());
    assert!(bin.join("loader.js").is_file());
    let manifest = std::fs::read_to_string(bin.join("app.appcache")).unwrap();
    assert!(manifest.starts_with("CACHE MANIFEST\n"));
}

#[test]
fn cli_wrap_json_output() {
    let dir = project();
    let output = pkx_bin(dir.path())
        .args(["--json", "wrap", "acme.util.math", "--no-polyfill", "--loader", "l.js"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        report["order"],
        serde_json::json!(["acme.util.strings/strings.js", "acme.util.math/math.js"])
    );
    assert_eq!(report["written"].as_array().unwrap().len(), 2);
    assert!(report["failed"].as_array().unwrap().is_empty());

    let loader = std::fs::read_to_string(dir.path().join("l.js")).unwrap();
    assert!(loader.starts_with("require("));
}

#[test]
fn cli_wrap_unknown_package_exits_with_resolve_code() {
    let dir = project();
    let output = pkx_bin(dir.path())
        .args(["wrap", "acme.nowhere"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Request 'acme.nowhere':"), "{stderr}");
}

#[test]
fn cli_wrap_rejects_escaping_output() {
    let dir = project();
    let output = pkx_bin(dir.path())
        .args(["wrap", "--output", "../elsewhere"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn cli_wrap_bad_request_json_exits_with_package_code() {
    let dir = project();
    let output = pkx_bin(dir.path())
        .args(["wrap", "[42]"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_info_prints_summary() {
    let dir = project();
    let output = pkx_bin(dir.path())
        .args(["info", "acme.util.math"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Request 'acme.util.math/':"), "{stdout}");
    assert!(stdout.contains("acme.util.math title"));
    assert!(stdout.contains("acme.util.strings/"));
}

#[test]
fn cli_build_bumps_and_archives() {
    let dir = project();
    let output = pkx_bin(dir.path())
        .args(["--json", "build", "--major", "--no-tag"])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "build must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["previous_version"], "0.1.0");
    assert_eq!(result["version"], "1.0.0");
    assert!(dir.path().join("build/acme.app.pkx").is_file());
}

#[test]
fn cli_install_hook_requires_git() {
    let dir = project();
    let output = pkx_bin(dir.path()).arg("install-hook").output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    std::fs::create_dir_all(dir.path().join(".git/hooks")).unwrap();
    let output = pkx_bin(dir.path()).arg("install-hook").output().unwrap();
    assert!(output.status.success());
    assert!(dir.path().join(".git/hooks/pre-commit").is_file());

    let output = pkx_bin(dir.path()).arg("uninstall-hook").output().unwrap();
    assert!(output.status.success());
    assert!(!dir.path().join(".git/hooks/pre-commit").exists());
}

#[test]
fn cli_clone_missing_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nowhere");
    let output = pkx_bin(dir.path())
        .args(["--json", "clone"])
        .arg(&missing)
        .arg("copy")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("git error:"));
    assert!(!dir.path().join("copy/.git").exists());
}

#[test]
fn cli_clone_without_hook() {
    if Command::new("git").arg("--version").output().is_err() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let origin = dir.path().join("origin");
    std::fs::create_dir(&origin).unwrap();
    let init = Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(&origin)
        .status()
        .unwrap();
    assert!(init.success());

    let output = pkx_bin(dir.path())
        .args(["--json", "clone", "--no-hook"])
        .arg(&origin)
        .arg("checkout")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "clone must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["hook"], false);
    assert!(dir.path().join("checkout/.git").is_dir());
    assert!(!dir.path().join("checkout/.git/hooks/pre-commit").exists());
}
