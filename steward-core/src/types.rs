//! Domain types shared across the steward workspace.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a target repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoName(pub String);

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed git branch name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchName(pub String);

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Platform tag for a target repository.
///
/// Produced either by an explicit override (which always wins) or by the
/// pure detection function in `steward-schema`; never inferred ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    Terraform,
    Dolibarr,
    Joomla,
    #[default]
    Generic,
    Standards,
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryType::Terraform => write!(f, "terraform"),
            RepositoryType::Dolibarr => write!(f, "dolibarr"),
            RepositoryType::Joomla => write!(f, "joomla"),
            RepositoryType::Generic => write!(f, "generic"),
            RepositoryType::Standards => write!(f, "standards"),
        }
    }
}

/// Policy governing deletion of untracked files during sync.
///
/// Blind deletion of user content is the highest-risk failure mode of a
/// bulk-sync tool; the default is the safest mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    #[default]
    None,
    Conservative,
    Aggressive,
}

impl fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupMode::None => write!(f, "none"),
            CleanupMode::Conservative => write!(f, "conservative"),
            CleanupMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Status of a per-repository sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Conflicted,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Conflicted => write!(f, "conflicted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Override document
// ---------------------------------------------------------------------------

/// A single exclusion or protection rule with an operator-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    /// Repository-relative path the rule applies to.
    pub path: PathBuf,
    pub reason: String,
}

/// Sync behaviour section of an override document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub cleanup_mode: CleanupMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_mode: CleanupMode::None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-repository override record.
///
/// A path may appear in at most one of `exclude_files`/`protected_files`;
/// if present in both, exclusion wins — exclusion removes the file from
/// consideration entirely, protection only blocks overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OverrideDocument {
    /// Explicit platform tag; suppresses auto-detection entirely when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_type: Option<RepositoryType>,
    #[serde(default)]
    pub exclude_files: Vec<OverrideRule>,
    #[serde(default)]
    pub protected_files: Vec<OverrideRule>,
    #[serde(default)]
    pub sync: SyncConfig,
}

// ---------------------------------------------------------------------------
// Sync job
// ---------------------------------------------------------------------------

/// A single planned file operation inside a sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FileOperation {
    /// Write `content` to the repository-relative `path`.
    Write { path: PathBuf, content: String },
    /// Delete the repository-relative `path` (cleanup-gated).
    Delete { path: PathBuf },
    /// Deliberately skipped path with the recorded reason.
    Skip { path: PathBuf, reason: String },
}

impl FileOperation {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileOperation::Write { path, .. }
            | FileOperation::Delete { path }
            | FileOperation::Skip { path, .. } => path,
        }
    }

    /// True for operations that mutate the working copy.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            FileOperation::Write { .. } | FileOperation::Delete { .. }
        )
    }
}

/// A fully-materialized plan for one repository, owned exclusively by the
/// executor during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub repository: RepoName,
    pub branch: BranchName,
    pub operations: Vec<FileOperation>,
    #[serde(default)]
    pub status: JobStatus,
}

impl SyncJob {
    /// Count of operations that would actually mutate the working copy.
    pub fn mutation_count(&self) -> usize {
        self.operations.iter().filter(|o| o.is_mutation()).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
