use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn libkit() -> Command {
    let mut cmd = Command::cargo_bin("libkit").unwrap();
    cmd.env_remove("SEP_CSS").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_init_then_build() {
    let dir = tempfile::tempdir().unwrap();

    libkit()
        .current_dir(dir.path())
        .args(["init", "my-lib"])
        .assert()
        .success()
        .stderr(predicate::str::contains("libkit.toml"));

    let project = dir.path().join("my-lib");
    libkit()
        .current_dir(&project)
        .args(["build", "--format", "es"])
        .assert()
        .success()
        .stderr(predicate::str::contains("esm-split"));

    assert!(project.join("dist/esm/index.js").is_file());
    assert!(project.join("dist/esm/button.js").is_file());
    assert!(project.join("dist/my-lib.esm.js").is_file());
    assert!(project.join("dist/components/button/index.js").is_file());
    assert!(!project.join("dist/cjs").exists());
}

#[test]
fn test_extract_css_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    libkit().current_dir(dir.path()).arg("init").assert().success();

    libkit()
        .current_dir(dir.path())
        .args(["build", "--format", "cjs"])
        .env("SEP_CSS", "1")
        .assert()
        .success();

    let css = fs::read_to_string(dir.path().join("dist/bundle.css")).unwrap();
    assert!(css.contains("--primary-color"));
    assert!(dir.path().join("dist/cjs/button.js").is_file());
}

#[test]
fn test_broken_component_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    libkit().current_dir(dir.path()).arg("init").assert().success();
    fs::write(
        dir.path().join("src/components/button/index.ts"),
        "export default function ( {\n",
    )
    .unwrap();

    libkit()
        .current_dir(dir.path())
        .args(["build", "--format", "es"])
        .env("NO_COLOR", "1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("work unit(s) failed"))
        .stderr(predicate::str::contains("✗ esm-split"))
        .stderr(predicate::str::contains("✗ umd-per-component:button"));

    assert!(!dir.path().join("dist/esm").exists());
}

#[test]
fn test_missing_sources_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();

    libkit()
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    libkit().current_dir(dir.path()).arg("init").assert().success();

    libkit()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
