//! Repository platform detection.
//!
//! `detect_repository_type(root)` inspects indicator files in a working copy
//! and returns one explicit [`RepositoryType`] variant. Probes are ordered by
//! specificity: platform-specific markers take priority over generic ones,
//! and `Generic` is the fallback rather than a failure.
//!
//! An override document's explicit `repository_type` always bypasses
//! detection entirely; see [`effective_repository_type`].

use std::fs;
use std::path::Path;

use steward_core::types::{OverrideDocument, RepositoryType};

/// The repository type to use for `root`: the override's explicit tag when
/// present, otherwise the detected one.
pub fn effective_repository_type(root: &Path, override_doc: &OverrideDocument) -> RepositoryType {
    match override_doc.repository_type {
        Some(explicit) => explicit,
        None => detect_repository_type(root),
    }
}

/// Detect the platform of the working copy at `root`.
///
/// Pure probe over the filesystem: no state, no mutation, always returns a
/// variant.
pub fn detect_repository_type(root: &Path) -> RepositoryType {
    if is_terraform(root) {
        return RepositoryType::Terraform;
    }
    if is_dolibarr(root) {
        return RepositoryType::Dolibarr;
    }
    if is_joomla(root) {
        return RepositoryType::Joomla;
    }
    if is_standards(root) {
        return RepositoryType::Standards;
    }
    RepositoryType::Generic
}

fn is_terraform(root: &Path) -> bool {
    if root.join("main.tf").exists() {
        return true;
    }
    // Any *.tf at the repository root counts.
    fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.file_name().to_string_lossy().ends_with(".tf"))
        })
        .unwrap_or(false)
}

fn is_dolibarr(root: &Path) -> bool {
    root.join("htdocs").join("main.inc.php").exists()
        || root.join("htdocs").join("conf").join("conf.php.example").exists()
}

fn is_joomla(root: &Path) -> bool {
    let administrator = root.join("administrator").is_dir();
    administrator
        && (root.join("configuration.php").exists()
            || root.join("installation").is_dir()
            || root.join("joomla.xml").exists())
}

fn is_standards(root: &Path) -> bool {
    root.join("schemas").is_dir() && root.join("docs").join("standards").is_dir()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
