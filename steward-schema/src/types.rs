//! Schema data model: raw documents as authored on disk and the flattened
//! [`SchemaDefinition`] the rest of the workspace consumes.
//!
//! A `SchemaDefinition` is immutable once loaded and identified by
//! `(name, version)`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use steward_core::types::{OverrideRule, RepositoryType};

// ---------------------------------------------------------------------------
// Flattened definition
// ---------------------------------------------------------------------------

/// Kind of a required repository entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A file or directory the schema requires a repository to carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Repository types this entry applies to; empty means all types.
    #[serde(default)]
    pub applies_to: Vec<RepositoryType>,
    /// Points awarded when the entry is present.
    #[serde(default = "default_entry_weight")]
    pub weight_points: u32,
}

fn default_entry_weight() -> u32 {
    10
}

impl RequiredEntry {
    /// True when the entry is scored for the given repository type.
    pub fn applies(&self, repository_type: RepositoryType) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&repository_type)
    }
}

/// Declarative predicate a compliance check evaluates against a tree.
///
/// Rules are deterministic given identical input; evaluation never touches
/// anything outside the snapshotted tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckRule {
    /// The file exists anywhere the path names it.
    FileExists { path: PathBuf },
    /// The directory exists.
    DirectoryExists { path: PathBuf },
    /// The file exists and contains the literal `pattern`.
    FileContains { path: PathBuf, pattern: String },
    /// The file exists and is not empty after trimming whitespace.
    FileNonEmpty { path: PathBuf },
}

/// A single weighted compliance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub id: String,
    pub category: String,
    pub weight_points: u32,
    pub rule: CheckRule,
    /// Repository types this check applies to; empty means all types.
    #[serde(default)]
    pub applies_to: Vec<RepositoryType>,
}

impl ComplianceCheck {
    pub fn applies(&self, repository_type: RepositoryType) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&repository_type)
    }
}

/// A document mirrored at two repository-relative locations that must be
/// kept in sync (e.g. a root README mirrored under `docs/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorPair {
    pub path_a: PathBuf,
    pub path_b: PathBuf,
}

/// One health level band. Ranges are `[min_percent, max_percent)` except the
/// topmost band, which includes 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthThreshold {
    pub level: String,
    pub min_percent: u32,
    pub max_percent: u32,
}

/// Flattened, immutable schema produced by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    pub version: String,
    pub required: Vec<RequiredEntry>,
    pub checks: Vec<ComplianceCheck>,
    pub thresholds: Vec<HealthThreshold>,
    /// Base-level exclusions, unioned with any override-level equivalents.
    #[serde(default)]
    pub exclude_files: Vec<OverrideRule>,
    /// Base-level protections, unioned with any override-level equivalents.
    #[serde(default)]
    pub protected_files: Vec<OverrideRule>,
    /// Dual-location documents subject to conflict resolution during sync.
    #[serde(default)]
    pub mirrors: Vec<MirrorPair>,
}

impl SchemaDefinition {
    /// The threshold band containing `score`, if the score is in range.
    pub fn level_for(&self, score: f64) -> Option<&str> {
        let score = score.clamp(0.0, 100.0);
        self.thresholds
            .iter()
            .find(|t| {
                let min = t.min_percent as f64;
                let max = t.max_percent as f64;
                score >= min && (score < max || (t.max_percent == 100 && score <= 100.0))
            })
            .map(|t| t.level.as_str())
    }

    /// The level of the band starting at 0 — the failing band.
    pub fn failing_level(&self) -> Option<&str> {
        self.thresholds
            .iter()
            .find(|t| t.min_percent == 0)
            .map(|t| t.level.as_str())
    }
}

// ---------------------------------------------------------------------------
// Raw on-disk document
// ---------------------------------------------------------------------------

/// `metadata` section of a schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub name: String,
    pub version: String,
}

/// A schema document as authored on disk, before `extends` flattening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SchemaDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SchemaMetadata>,
    /// File-stem of a sibling document this one extends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub root_files: Vec<RequiredEntry>,
    #[serde(default)]
    pub directories: Vec<RequiredEntry>,
    #[serde(default)]
    pub checks: Vec<ComplianceCheck>,
    #[serde(default)]
    pub thresholds: Vec<HealthThreshold>,
    #[serde(default)]
    pub exclude_files: Vec<OverrideRule>,
    #[serde(default)]
    pub protected_files: Vec<OverrideRule>,
    #[serde(default)]
    pub mirrors: Vec<MirrorPair>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Vec<HealthThreshold> {
        vec![
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
        ]
    }

    fn definition() -> SchemaDefinition {
        SchemaDefinition {
            name: "org-standards".into(),
            version: "1.0.0".into(),
            required: vec![],
            checks: vec![],
            thresholds: thresholds(),
            exclude_files: vec![],
            protected_files: vec![],
            mirrors: vec![],
        }
    }

    #[test]
    fn level_for_boundary_scores() {
        let def = definition();
        assert_eq!(def.level_for(0.0), Some("critical"));
        assert_eq!(def.level_for(49.9), Some("critical"));
        assert_eq!(def.level_for(50.0), Some("warning"));
        assert_eq!(def.level_for(80.0), Some("healthy"));
        assert_eq!(def.level_for(100.0), Some("healthy"));
    }

    #[test]
    fn failing_level_is_zero_based_band() {
        assert_eq!(definition().failing_level(), Some("critical"));
    }

    #[test]
    fn required_entry_applies_to_empty_means_all() {
        let entry = RequiredEntry {
            path: PathBuf::from("README.md"),
            kind: EntryKind::File,
            applies_to: vec![],
            weight_points: 10,
        };
        assert!(entry.applies(steward_core::types::RepositoryType::Terraform));
        assert!(entry.applies(steward_core::types::RepositoryType::Generic));
    }

    #[test]
    fn check_rule_serde_tagged_form() {
        let yaml = "type: file_contains\npath: README.md\npattern: '## Installation'\n";
        let rule: CheckRule = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(
            rule,
            CheckRule::FileContains {
                path: PathBuf::from("README.md"),
                pattern: "## Installation".into(),
            }
        );
    }

    #[test]
    fn schema_document_parses_minimal_yaml() {
        let yaml = r#"
metadata:
  name: base
  version: "1.0.0"
checks:
  - id: has-readme
    category: documentation
    weight_points: 10
    rule:
      type: file_exists
      path: README.md
thresholds:
  - level: fail
    min_percent: 0
    max_percent: 60
  - level: pass
    min_percent: 60
    max_percent: 100
"#;
        let doc: SchemaDocument = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(doc.metadata.as_ref().map(|m| m.name.as_str()), Some("base"));
        assert_eq!(doc.checks.len(), 1);
        assert!(doc.extends.is_none());
    }
}
