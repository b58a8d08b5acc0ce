//! End-to-end tests for `steward check`.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCHEMA: &str = r#"
metadata:
  name: org-standards
  version: "1.0.0"
root_files:
  - path: README.md
    kind: file
  - path: LICENSE
    kind: file
checks:
  - id: readme-has-title
    category: documentation
    weight_points: 5
    rule:
      type: file_contains
      path: README.md
      pattern: '# '
thresholds:
  - level: critical
    min_percent: 0
    max_percent: 50
  - level: warning
    min_percent: 50
    max_percent: 80
  - level: healthy
    min_percent: 80
    max_percent: 100
"#;

fn write_schema(dir: &Path) {
    fs::create_dir_all(dir).expect("schema dir");
    fs::write(dir.join("standards.yaml"), SCHEMA).expect("schema file");
}

fn steward() -> Command {
    Command::cargo_bin("steward").expect("binary")
}

#[test]
fn compliant_repository_passes_with_exit_zero() {
    let tmp = TempDir::new().expect("tmp");
    let schemas = tmp.path().join("schemas");
    write_schema(&schemas);
    let repo = tmp.path().join("repo");
    fs::create_dir(&repo).expect("repo");
    fs::write(repo.join("README.md"), "# My Service\n").expect("readme");
    fs::write(repo.join("LICENSE"), "MIT\n").expect("license");

    steward()
        .arg("check")
        .arg(&repo)
        .arg("--schema-dir")
        .arg(&schemas)
        .assert()
        .success()
        .stdout(predicate::str::contains("overall_score: 100.0"))
        .stdout(predicate::str::contains("level: healthy"));
}

#[test]
fn empty_repository_fails_with_exit_one() {
    let tmp = TempDir::new().expect("tmp");
    let schemas = tmp.path().join("schemas");
    write_schema(&schemas);
    let repo = tmp.path().join("repo");
    fs::create_dir(&repo).expect("repo");

    steward()
        .arg("check")
        .arg(&repo)
        .arg("--schema-dir")
        .arg(&schemas)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("level: critical"))
        .stdout(predicate::str::contains("add required file 'README.md'"));
}

#[test]
fn partially_compliant_repository_reports_warning_but_passes() {
    let tmp = TempDir::new().expect("tmp");
    let schemas = tmp.path().join("schemas");
    write_schema(&schemas);
    let repo = tmp.path().join("repo");
    fs::create_dir(&repo).expect("repo");
    fs::write(repo.join("README.md"), "# My Service\n").expect("readme");

    // 15 of 25 points = 60%, inside the warning band.
    steward()
        .arg("check")
        .arg(&repo)
        .arg("--schema-dir")
        .arg(&schemas)
        .assert()
        .success()
        .stdout(predicate::str::contains("overall_score: 60.0"))
        .stdout(predicate::str::contains("level: warning"));
}

#[test]
fn json_output_is_machine_readable() {
    let tmp = TempDir::new().expect("tmp");
    let schemas = tmp.path().join("schemas");
    write_schema(&schemas);
    let repo = tmp.path().join("repo");
    fs::create_dir(&repo).expect("repo");
    fs::write(repo.join("README.md"), "# ok\n").expect("readme");
    fs::write(repo.join("LICENSE"), "MIT\n").expect("license");

    let output = steward()
        .arg("check")
        .arg(&repo)
        .arg("--schema-dir")
        .arg(&schemas)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");
    assert_eq!(parsed["schema_name"], "org-standards");
    assert_eq!(parsed["level"], "healthy");
}

#[test]
fn missing_schema_is_a_configuration_error() {
    let tmp = TempDir::new().expect("tmp");
    let repo = tmp.path().join("repo");
    fs::create_dir(&repo).expect("repo");

    steward()
        .arg("check")
        .arg(&repo)
        .arg("--schema-dir")
        .arg(tmp.path().join("nowhere"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot load schema"));
}
