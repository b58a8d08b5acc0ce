//! Override resolution: per-path sync decisions.
//!
//! `decide` is a pure function over the effective override document and the
//! current template set. Exclusion wins over protection — an excluded path
//! is removed from consideration entirely, a protected path only resists
//! overwrite (and deletion).
//!
//! Cleanup deletion is gated three ways because blind deletion of user
//! content is the single highest-risk failure mode of a bulk-sync tool:
//! - `none` — never;
//! - `conservative` — only managed-extension files inside a managed
//!   directory that the template set no longer carries;
//! - `aggressive` — any file inside a managed directory absent from the
//!   template set.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use steward_core::types::{CleanupMode, OverrideDocument};
use steward_schema::types::SchemaDefinition;

/// Extensions the engine considers managed under `conservative` cleanup.
pub const MANAGED_EXTENSIONS: &[&str] = &["yml", "yaml", "sh", "ps1"];

/// Directories whose contents the engine manages during cleanup.
pub const MANAGED_DIRS: &[&str] = &[".github", "scripts"];

/// Outcome of resolving one candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub excluded: bool,
    pub protected: bool,
    pub allow_cleanup_deletion: bool,
    /// Operator-facing reason when excluded or protected.
    pub reason: Option<String>,
}

/// The override document a planner should consult: the per-repository
/// document with the schema's base-level lists unioned in (additive only).
pub fn merged_with_schema(doc: &OverrideDocument, schema: &SchemaDefinition) -> OverrideDocument {
    let mut merged = doc.clone();
    for rule in &schema.exclude_files {
        if !merged.exclude_files.iter().any(|r| r.path == rule.path) {
            merged.exclude_files.push(rule.clone());
        }
    }
    for rule in &schema.protected_files {
        if !merged.protected_files.iter().any(|r| r.path == rule.path) {
            merged.protected_files.push(rule.clone());
        }
    }
    merged
}

/// Decide what may happen to `path` under `doc`.
///
/// `template_set` is the set of repository-relative paths the template
/// source currently provides; cleanup deletion only ever applies to paths
/// outside it.
pub fn decide(path: &Path, doc: &OverrideDocument, template_set: &BTreeSet<PathBuf>) -> Decision {
    if let Some(rule) = doc.exclude_files.iter().find(|r| r.path == path) {
        // Exclusion precedence: even a path also listed as protected is
        // treated as excluded.
        return Decision {
            excluded: true,
            protected: false,
            allow_cleanup_deletion: false,
            reason: Some(rule.reason.clone()),
        };
    }

    if let Some(rule) = doc.protected_files.iter().find(|r| r.path == path) {
        return Decision {
            excluded: false,
            protected: true,
            allow_cleanup_deletion: false,
            reason: Some(rule.reason.clone()),
        };
    }

    Decision {
        excluded: false,
        protected: false,
        allow_cleanup_deletion: cleanup_allowed(path, doc.sync.cleanup_mode, template_set),
        reason: None,
    }
}

fn cleanup_allowed(path: &Path, mode: CleanupMode, template_set: &BTreeSet<PathBuf>) -> bool {
    if template_set.contains(path) {
        return false;
    }
    match mode {
        CleanupMode::None => false,
        CleanupMode::Conservative => in_managed_dir(path) && has_managed_extension(path),
        CleanupMode::Aggressive => in_managed_dir(path),
    }
}

fn in_managed_dir(path: &Path) -> bool {
    let Some(first) = path.components().next() else {
        return false;
    };
    let first = first.as_os_str().to_string_lossy();
    MANAGED_DIRS.contains(&first.as_ref()) && path.components().count() > 1
}

fn has_managed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MANAGED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
