//! Compliance evaluation.
//!
//! Scoring rules:
//! - every required entry and every check awards its `weight_points` when
//!   satisfied, else 0;
//! - checks are independent and order-independent — category sums are
//!   commutative by construction (`BTreeMap` accumulation);
//! - `overall_score = 100 * earned / possible` across categories;
//! - a category whose `possible` is 0 (misconfigured schema) is excluded
//!   from the denominator instead of dividing by zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use steward_core::types::RepositoryType;
use steward_schema::types::{CheckRule, EntryKind, SchemaDefinition};

use crate::error::HealthError;
use crate::tree::RepoTree;

/// Category required-entry scores are accumulated under.
pub const STRUCTURE_CATEGORY: &str = "structure";

/// Earned vs possible points for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CategoryScore {
    pub earned: u32,
    pub possible: u32,
}

/// Scored evaluation of one repository against one schema.
///
/// Immutable value object: created per evaluation run, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub schema_name: String,
    pub schema_version: String,
    pub repository_type: RepositoryType,
    pub overall_score: f64,
    pub level: String,
    pub categories: BTreeMap<String, CategoryScore>,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    /// True when the score landed in the zero-based threshold band.
    pub fn is_failing(&self, schema: &SchemaDefinition) -> bool {
        schema.failing_level() == Some(self.level.as_str())
    }
}

/// Evaluate `tree` against `schema` for the given repository type.
///
/// Deterministic: identical `(tree, schema, repository_type)` always yields
/// an identical report.
pub fn evaluate(
    tree: &RepoTree,
    schema: &SchemaDefinition,
    repository_type: RepositoryType,
) -> Result<HealthReport, HealthError> {
    let mut categories: BTreeMap<String, CategoryScore> = BTreeMap::new();
    let mut recommendations: Vec<String> = Vec::new();

    for entry in &schema.required {
        if !entry.applies(repository_type) {
            continue;
        }
        let satisfied = match entry.kind {
            EntryKind::File => tree.contains_file(&entry.path),
            EntryKind::Directory => tree.contains_dir(&entry.path),
        };
        award(
            &mut categories,
            STRUCTURE_CATEGORY,
            entry.weight_points,
            satisfied,
        );
        if !satisfied {
            let noun = match entry.kind {
                EntryKind::File => "file",
                EntryKind::Directory => "directory",
            };
            recommendations.push(format!("add required {noun} '{}'", entry.path.display()));
        }
    }

    for check in &schema.checks {
        if !check.applies(repository_type) {
            continue;
        }
        let satisfied = evaluate_rule(tree, &check.rule)?;
        award(&mut categories, &check.category, check.weight_points, satisfied);
        if !satisfied {
            recommendations.push(describe_failure(&check.id, &check.rule));
        }
    }

    let (earned, possible) = categories
        .values()
        .filter(|score| score.possible > 0)
        .fold((0u32, 0u32), |(e, p), score| {
            (e + score.earned, p + score.possible)
        });

    let overall_score = if possible == 0 {
        // A schema with no scorable categories evaluates to a full score
        // rather than dividing by zero.
        100.0
    } else {
        100.0 * f64::from(earned) / f64::from(possible)
    };

    let level = schema
        .level_for(overall_score)
        .unwrap_or("unconfigured")
        .to_string();

    tracing::debug!(
        schema = %schema.name,
        score = overall_score,
        level = %level,
        "evaluated repository"
    );

    Ok(HealthReport {
        schema_name: schema.name.clone(),
        schema_version: schema.version.clone(),
        repository_type,
        overall_score,
        level,
        categories,
        recommendations,
    })
}

fn award(categories: &mut BTreeMap<String, CategoryScore>, category: &str, points: u32, satisfied: bool) {
    let score = categories.entry(category.to_string()).or_default();
    score.possible += points;
    if satisfied {
        score.earned += points;
    }
}

fn evaluate_rule(tree: &RepoTree, rule: &CheckRule) -> Result<bool, HealthError> {
    Ok(match rule {
        CheckRule::FileExists { path } => tree.contains_file(path),
        CheckRule::DirectoryExists { path } => tree.contains_dir(path),
        CheckRule::FileContains { path, pattern } => match tree.read_file(path)? {
            Some(content) => content.contains(pattern.as_str()),
            None => false,
        },
        CheckRule::FileNonEmpty { path } => match tree.read_file(path)? {
            Some(content) => !content.trim().is_empty(),
            None => false,
        },
    })
}

fn describe_failure(id: &str, rule: &CheckRule) -> String {
    match rule {
        CheckRule::FileExists { path } => {
            format!("[{id}] add file '{}'", path.display())
        }
        CheckRule::DirectoryExists { path } => {
            format!("[{id}] add directory '{}'", path.display())
        }
        CheckRule::FileContains { path, pattern } => {
            format!("[{id}] '{}' should contain '{pattern}'", path.display())
        }
        CheckRule::FileNonEmpty { path } => {
            format!("[{id}] '{}' should not be empty", path.display())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use steward_schema::types::{
        ComplianceCheck, HealthThreshold, RequiredEntry, SchemaDefinition,
    };

    use super::*;

    fn schema() -> SchemaDefinition {
        SchemaDefinition {
            name: "org-standards".into(),
            version: "1.0.0".into(),
            required: vec![
                RequiredEntry {
                    path: PathBuf::from("README.md"),
                    kind: EntryKind::File,
                    applies_to: vec![],
                    weight_points: 10,
                },
                RequiredEntry {
                    path: PathBuf::from("LICENSE"),
                    kind: EntryKind::File,
                    applies_to: vec![],
                    weight_points: 10,
                },
            ],
            checks: vec![ComplianceCheck {
                id: "readme-heading".into(),
                category: "documentation".into(),
                weight_points: 5,
                rule: CheckRule::FileContains {
                    path: PathBuf::from("README.md"),
                    pattern: "# ".into(),
                },
                applies_to: vec![],
            }],
            thresholds: vec![
                HealthThreshold {
                    level: "critical".into(),
                    min_percent: 0,
                    max_percent: 50,
                },
                HealthThreshold {
                    level: "warning".into(),
                    min_percent: 50,
                    max_percent: 80,
                },
                HealthThreshold {
                    level: "healthy".into(),
                    min_percent: 80,
                    max_percent: 100,
                },
            ],
            exclude_files: vec![],
            protected_files: vec![],
            mirrors: vec![],
        }
    }

    fn repo_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().expect("dir");
        for (rel, content) in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(path, content).expect("write");
        }
        dir
    }

    #[test]
    fn full_compliance_scores_one_hundred() {
        let dir = repo_with(&[("README.md", "# demo\n"), ("LICENSE", "MIT\n")]);
        let tree = RepoTree::snapshot(dir.path()).expect("snapshot");
        let report = evaluate(&tree, &schema(), RepositoryType::Generic).expect("evaluate");

        assert_eq!(report.overall_score, 100.0);
        assert_eq!(report.level, "healthy");
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn missing_license_deducts_exactly_its_weight() {
        // README (10) + readme-heading (5) earned, LICENSE (10) missed:
        // 15 of 25 possible = 60%.
        let dir = repo_with(&[("README.md", "# demo\n")]);
        let tree = RepoTree::snapshot(dir.path()).expect("snapshot");
        let report = evaluate(&tree, &schema(), RepositoryType::Generic).expect("evaluate");

        assert_eq!(report.overall_score, 60.0);
        assert_eq!(report.level, "warning");
        assert_eq!(report.recommendations.len(), 1);
        assert!(report.recommendations[0].contains("LICENSE"));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let dir = repo_with(&[("README.md", "# demo\n")]);
        let tree = RepoTree::snapshot(dir.path()).expect("snapshot");
        let first = evaluate(&tree, &schema(), RepositoryType::Generic).expect("evaluate");
        let second = evaluate(&tree, &schema(), RepositoryType::Generic).expect("evaluate");
        assert_eq!(first, second);
    }

    #[test]
    fn category_score_is_independent_of_check_order() {
        let dir = repo_with(&[("README.md", "# demo\n"), ("LICENSE", "MIT\n")]);
        let tree = RepoTree::snapshot(dir.path()).expect("snapshot");

        let forward = schema();
        let mut reversed = schema();
        reversed.required.reverse();
        reversed.checks.reverse();

        let a = evaluate(&tree, &forward, RepositoryType::Generic).expect("evaluate");
        let b = evaluate(&tree, &reversed, RepositoryType::Generic).expect("evaluate");
        assert_eq!(a.categories, b.categories);
        assert_eq!(a.overall_score, b.overall_score);
    }

    #[test]
    fn zero_possible_category_is_excluded_from_denominator() {
        let mut s = schema();
        s.checks.push(ComplianceCheck {
            id: "phantom".into(),
            category: "misconfigured".into(),
            weight_points: 0,
            rule: CheckRule::FileExists {
                path: PathBuf::from("GHOST"),
            },
            applies_to: vec![],
        });

        let dir = repo_with(&[("README.md", "# demo\n"), ("LICENSE", "MIT\n")]);
        let tree = RepoTree::snapshot(dir.path()).expect("snapshot");
        let report = evaluate(&tree, &s, RepositoryType::Generic).expect("evaluate");

        // The zero-weight category contributes nothing either way.
        assert_eq!(report.overall_score, 100.0);
        assert_eq!(
            report.categories.get("misconfigured"),
            Some(&CategoryScore {
                earned: 0,
                possible: 0
            })
        );
    }

    #[test]
    fn applies_to_filters_by_repository_type() {
        let mut s = schema();
        s.checks.push(ComplianceCheck {
            id: "tf-backend".into(),
            category: "infrastructure".into(),
            weight_points: 20,
            rule: CheckRule::FileExists {
                path: PathBuf::from("backend.tf"),
            },
            applies_to: vec![RepositoryType::Terraform],
        });

        let dir = repo_with(&[("README.md", "# demo\n"), ("LICENSE", "MIT\n")]);
        let tree = RepoTree::snapshot(dir.path()).expect("snapshot");

        let generic = evaluate(&tree, &s, RepositoryType::Generic).expect("evaluate");
        assert_eq!(generic.overall_score, 100.0, "tf check must not apply");

        let terraform = evaluate(&tree, &s, RepositoryType::Terraform).expect("evaluate");
        assert!(terraform.overall_score < 100.0, "tf check applies and fails");
    }

    #[test]
    fn file_contains_misses_when_pattern_absent() {
        let dir = repo_with(&[("README.md", "no heading\n"), ("LICENSE", "MIT\n")]);
        let tree = RepoTree::snapshot(dir.path()).expect("snapshot");
        let report = evaluate(&tree, &schema(), RepositoryType::Generic).expect("evaluate");
        assert_eq!(report.overall_score, 80.0);
        assert!(report.recommendations[0].contains("readme-heading"));
    }
}
