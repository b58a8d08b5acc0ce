//! Schema document loading and merging.
//!
//! # Merge model
//!
//! Documents are loaded arena-style: the whole `extends` chain is read into
//! memory first, then flattened in a single acyclic pass from the chain root
//! down to the requested document. Circular chains are fatal.
//!
//! Merge rules, parent first:
//! - `metadata` — the requested document's wins;
//! - `root_files` / `directories` / `checks` — appended, deduplicated by
//!   path (entries) or fatal on duplicate id (checks);
//! - `thresholds` — the nearest document that declares any wins outright;
//! - `exclude_files` / `protected_files` — unioned, additive only.
//!
//! An override document is additive on top of the flattened definition:
//! its exclude/protect lists union with the base-level equivalents, never
//! subtract.

use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use steward_core::types::{OverrideDocument, OverrideRule};

use crate::error::{io_err, SchemaError};
use crate::types::{
    ComplianceCheck, HealthThreshold, MirrorPair, RequiredEntry, SchemaDefinition, SchemaDocument,
};

// ---------------------------------------------------------------------------
// Document loading
// ---------------------------------------------------------------------------

/// Path to a named schema document inside `dir` — pure, no I/O.
pub fn document_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.yaml"))
}

/// Load a single raw schema document by file-stem from `dir`.
pub fn load_document(dir: &Path, name: &str) -> Result<SchemaDocument, SchemaError> {
    let path = document_path(dir, name);
    if !path.exists() {
        return Err(SchemaError::ExtendsNotFound {
            name: name.to_string(),
            path,
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| SchemaError::Parse { path, source: e })
}

/// Load a per-repository override document.
///
/// An absent file yields the all-defaults document (sync enabled, no
/// exclusions, cleanup mode `none`).
pub fn load_override(path: &Path) -> Result<OverrideDocument, SchemaError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(OverrideDocument::default()),
        Err(err) => return Err(io_err(path, err)),
    };
    serde_yaml::from_str(&contents).map_err(|e| SchemaError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Load the named schema from `dir`, resolve its `extends` chain, validate,
/// and apply the optional per-repository override.
pub fn load_at(
    dir: &Path,
    name: &str,
    override_doc: Option<&OverrideDocument>,
) -> Result<SchemaDefinition, SchemaError> {
    let chain = resolve_chain(dir, name)?;
    let mut definition = flatten(name, &chain)?;

    if let Some(doc) = override_doc {
        merge_rules(&mut definition.exclude_files, &doc.exclude_files);
        merge_rules(&mut definition.protected_files, &doc.protected_files);
    }

    validate(&definition)?;
    Ok(definition)
}

/// Arena of loaded documents, ordered root-of-chain first.
fn resolve_chain(dir: &Path, name: &str) -> Result<Vec<(String, SchemaDocument)>, SchemaError> {
    let mut arena: HashMap<String, SchemaDocument> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    let mut current = name.to_string();
    loop {
        if !seen.insert(current.clone()) {
            let mut chain: Vec<String> = order.clone();
            chain.push(current.clone());
            return Err(SchemaError::CircularExtends {
                chain: chain.join(" -> "),
            });
        }
        let doc = load_document(dir, &current)?;
        let parent = doc.extends.clone();
        arena.insert(current.clone(), doc);
        order.push(current.clone());
        match parent {
            Some(next) => current = next,
            None => break,
        }
    }

    // Parent documents merge first.
    order.reverse();
    Ok(order
        .into_iter()
        .map(|n| {
            let doc = arena.remove(&n).unwrap_or_default();
            (n, doc)
        })
        .collect())
}

fn flatten(
    requested: &str,
    chain: &[(String, SchemaDocument)],
) -> Result<SchemaDefinition, SchemaError> {
    let mut required: Vec<RequiredEntry> = Vec::new();
    let mut checks: Vec<ComplianceCheck> = Vec::new();
    let mut thresholds: Vec<HealthThreshold> = Vec::new();
    let mut exclude_files: Vec<OverrideRule> = Vec::new();
    let mut protected_files: Vec<OverrideRule> = Vec::new();
    let mut mirrors: Vec<MirrorPair> = Vec::new();
    let mut metadata = None;

    for (_, doc) in chain {
        for entry in doc.root_files.iter().chain(doc.directories.iter()) {
            // Child entries replace same-path parent entries.
            required.retain(|e| e.path != entry.path);
            required.push(entry.clone());
        }
        for check in &doc.checks {
            if checks.iter().any(|c| c.id == check.id) {
                return Err(SchemaError::DuplicateCheckId {
                    id: check.id.clone(),
                });
            }
            checks.push(check.clone());
        }
        if !doc.thresholds.is_empty() {
            thresholds = doc.thresholds.clone();
        }
        merge_rules(&mut exclude_files, &doc.exclude_files);
        merge_rules(&mut protected_files, &doc.protected_files);
        for pair in &doc.mirrors {
            if !mirrors.contains(pair) {
                mirrors.push(pair.clone());
            }
        }
        if doc.metadata.is_some() {
            metadata = doc.metadata.clone();
        }
    }

    let metadata = metadata.ok_or_else(|| SchemaError::MissingSection {
        name: requested.to_string(),
        section: "metadata".to_string(),
    })?;

    Ok(SchemaDefinition {
        name: metadata.name,
        version: metadata.version,
        required,
        checks,
        thresholds,
        exclude_files,
        protected_files,
        mirrors,
    })
}

/// Union `extra` into `rules`, first-listed reason wins per path.
fn merge_rules(rules: &mut Vec<OverrideRule>, extra: &[OverrideRule]) {
    for rule in extra {
        if !rules.iter().any(|r| r.path == rule.path) {
            rules.push(rule.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(definition: &SchemaDefinition) -> Result<(), SchemaError> {
    if definition.required.is_empty() && definition.checks.is_empty() {
        return Err(SchemaError::MissingSection {
            name: definition.name.clone(),
            section: "checks".to_string(),
        });
    }
    if definition.thresholds.is_empty() {
        return Err(SchemaError::MissingSection {
            name: definition.name.clone(),
            section: "thresholds".to_string(),
        });
    }
    validate_thresholds(&definition.thresholds)
}

/// Threshold bands must be sorted, non-overlapping, contiguous, and cover
/// the full 0–100 range. Anything else is a configuration error.
fn validate_thresholds(thresholds: &[HealthThreshold]) -> Result<(), SchemaError> {
    let mut sorted: Vec<&HealthThreshold> = thresholds.iter().collect();
    sorted.sort_by_key(|t| t.min_percent);

    let first = sorted[0];
    if first.min_percent != 0 {
        return Err(SchemaError::InvalidThresholds {
            detail: format!(
                "lowest band '{}' starts at {}, expected 0",
                first.level, first.min_percent
            ),
        });
    }

    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.max_percent != next.min_percent {
            return Err(SchemaError::InvalidThresholds {
                detail: format!(
                    "band '{}' ends at {} but band '{}' starts at {}",
                    prev.level, prev.max_percent, next.level, next.min_percent
                ),
            });
        }
    }

    let last = sorted[sorted.len() - 1];
    if last.max_percent != 100 {
        return Err(SchemaError::InvalidThresholds {
            detail: format!(
                "highest band '{}' ends at {}, expected 100",
                last.level, last.max_percent
            ),
        });
    }

    for t in sorted {
        if t.min_percent >= t.max_percent {
            return Err(SchemaError::InvalidThresholds {
                detail: format!(
                    "band '{}' has empty range {}–{}",
                    t.level, t.min_percent, t.max_percent
                ),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
