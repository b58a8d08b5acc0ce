//! End-to-end tests for `steward sync` and `steward plan`.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCHEMA: &str = r#"
metadata:
  name: org-standards
  version: "1.0.0"
root_files:
  - path: LICENSE
    kind: file
thresholds:
  - level: critical
    min_percent: 0
    max_percent: 50
  - level: healthy
    min_percent: 50
    max_percent: 100
"#;

struct Org {
    tmp: TempDir,
}

impl Org {
    fn new(repos: &[&str]) -> Self {
        let tmp = TempDir::new().expect("tmp");
        let schemas = tmp.path().join("schemas");
        fs::create_dir_all(&schemas).expect("schemas");
        fs::write(schemas.join("standards.yaml"), SCHEMA).expect("schema");

        let templates = tmp.path().join("templates");
        fs::create_dir_all(&templates).expect("templates");
        fs::write(templates.join("LICENSE"), "MIT\n").expect("template");

        let org = tmp.path().join("org");
        for repo in repos {
            fs::create_dir_all(org.join(repo)).expect("repo");
        }
        Self { tmp }
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        self.tmp.path().join(rel)
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::cargo_bin("steward").expect("binary");
        cmd.arg(subcommand)
            .arg("--org")
            .arg(self.path("org"))
            .arg("--schema-dir")
            .arg(self.path("schemas"))
            .arg("--templates")
            .arg(self.path("templates"))
            .arg("--state-dir")
            .arg(self.path("state"));
        cmd
    }
}

fn license_at(org: &Org, repo: &str) -> std::path::PathBuf {
    org.path("org").join(repo).join("LICENSE")
}

#[test]
fn sync_writes_templates_into_every_repository() {
    let org = Org::new(&["api", "web"]);

    org.command("sync")
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 completed"));

    for repo in ["api", "web"] {
        assert_eq!(
            fs::read_to_string(license_at(&org, repo)).expect("license"),
            "MIT\n"
        );
    }
}

#[test]
fn dry_run_reports_but_mutates_nothing() {
    let org = Org::new(&["api"]);

    org.command("sync")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]"));

    assert!(!license_at(&org, "api").exists());
    assert!(!org.path("state").join("checkpoints").exists());
}

#[test]
fn repos_filter_narrows_the_batch() {
    let org = Org::new(&["api", "web", "docs"]);

    org.command("sync")
        .arg("--yes")
        .arg("--repos")
        .arg("api,docs")
        .assert()
        .success();

    assert!(license_at(&org, "api").exists());
    assert!(license_at(&org, "docs").exists());
    assert!(!license_at(&org, "web").exists());
}

#[test]
fn unknown_repo_in_filter_is_a_configuration_error() {
    let org = Org::new(&["api"]);

    org.command("sync")
        .arg("--yes")
        .arg("--repos")
        .arg("ghost")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("'ghost' not found"));
}

#[test]
fn disabled_override_skips_the_repository() {
    let org = Org::new(&["api", "opt-out"]);
    fs::write(
        org.path("org").join("opt-out").join(".steward.yaml"),
        "sync:\n  enabled: false\n",
    )
    .expect("override");

    org.command("sync")
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 completed"))
        .stdout(predicate::str::contains("1 skipped"));

    assert!(license_at(&org, "api").exists());
    assert!(!license_at(&org, "opt-out").exists());
}

#[test]
fn second_run_skips_completed_repositories() {
    let org = Org::new(&["api"]);

    org.command("sync").arg("--yes").assert().success();
    org.command("sync")
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 skipped"));
}

#[test]
fn plan_prints_pending_writes_without_mutating() {
    let org = Org::new(&["api"]);

    org.command("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 writes"))
        .stdout(predicate::str::contains("+MIT"));

    assert!(!license_at(&org, "api").exists());
}

#[test]
fn missing_org_flag_is_a_usage_error() {
    Command::cargo_bin("steward")
        .expect("binary")
        .arg("sync")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--org"));
}
