//! Sync planning.
//!
//! `plan` computes a fully-materialized, reviewable [`SyncPlan`] for one
//! repository before any mutation occurs:
//! - excluded template files are skipped with their recorded reason;
//! - differing, unprotected files are scheduled as writes (hash-gated, so
//!   identical content plans zero operations);
//! - protected, differing files are skipped with the protection reason;
//! - mirrored document pairs go through conflict resolution;
//! - cleanup candidates (present in the target, absent from the template
//!   set) pass the override resolver's deletion gate.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use similar::TextDiff;

use steward_core::types::{
    BranchName, FileOperation, JobStatus, OverrideDocument, RepoName, SyncJob,
};
use steward_health::RepoTree;
use steward_schema::types::MirrorPair;

use crate::baseline::{Baseline, BaselineFile};
use crate::conflict::{self, MirrorSide, SyncDirection};
use crate::error::{ConflictError, SyncError};
use crate::overrides;

// ---------------------------------------------------------------------------
// Template set
// ---------------------------------------------------------------------------

/// Which slice of the template set a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateScope {
    #[default]
    All,
    /// Documentation and configuration files only — no scripts.
    FilesOnly,
    /// Workflow and script files only.
    ScriptsOnly,
}

/// The materialized template source: repository-relative paths and their
/// already-rendered content. Rendering itself is an external capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSet {
    files: BTreeMap<PathBuf, String>,
}

impl TemplateSet {
    /// Load every file under `dir` as a template, path-relative to `dir`.
    pub fn load(dir: &Path) -> Result<Self, SyncError> {
        let tree = RepoTree::snapshot(dir)?;
        let mut files = BTreeMap::new();
        for rel in tree.files() {
            let content = tree.read_file(rel)?.unwrap_or_default();
            files.insert(rel.clone(), content);
        }
        Ok(Self { files })
    }

    pub fn from_entries<I, P, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        Self {
            files: entries
                .into_iter()
                .map(|(p, s)| (p.into(), s.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> BTreeSet<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &String)> {
        self.files.iter()
    }

    /// Narrow the set to the requested scope.
    pub fn scoped(&self, scope: TemplateScope) -> Self {
        let files = self
            .files
            .iter()
            .filter(|(path, _)| match scope {
                TemplateScope::All => true,
                TemplateScope::ScriptsOnly => is_script(path),
                TemplateScope::FilesOnly => !is_script(path),
            })
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect();
        Self { files }
    }
}

fn is_script(path: &Path) -> bool {
    let under_scripts = path
        .components()
        .next()
        .map(|c| c.as_os_str() == "scripts")
        .unwrap_or(false);
    let script_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e, "sh" | "ps1"))
        .unwrap_or(false);
    under_scripts || script_ext
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A single planned file diff for dry-run review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Fully-materialized plan for one repository.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub job: SyncJob,
    /// False when the override document disables sync for this repository.
    pub enabled: bool,
    pub diffs: Vec<FileDiff>,
    /// Terminal mirrored-document conflicts; a non-empty list marks the job
    /// conflicted and nothing is executed for it.
    pub conflicts: Vec<ConflictError>,
    /// Mirror digests to record in the baseline store after a successful
    /// apply.
    pub baseline_updates: Baseline,
}

impl SyncPlan {
    pub fn write_count(&self) -> usize {
        self.job
            .operations
            .iter()
            .filter(|o| matches!(o, FileOperation::Write { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.job
            .operations
            .iter()
            .filter(|o| matches!(o, FileOperation::Delete { .. }))
            .count()
    }

    pub fn skip_count(&self) -> usize {
        self.job
            .operations
            .iter()
            .filter(|o| matches!(o, FileOperation::Skip { .. }))
            .count()
    }
}

/// Compute the sync plan for one repository working copy.
///
/// `doc` must already be the effective override (per-repository document
/// merged with the schema's base-level lists, see
/// [`overrides::merged_with_schema`]). `scope` narrows which template
/// files are written this run; cleanup decisions always reference the
/// FULL template set, so a narrowed run never deletes a file the template
/// source still carries. No files are written.
pub fn plan(
    templates: &TemplateSet,
    target_root: &Path,
    doc: &OverrideDocument,
    mirrors: &[MirrorPair],
    baseline: &BaselineFile,
    repository: RepoName,
    branch: BranchName,
    scope: TemplateScope,
) -> Result<SyncPlan, SyncError> {
    if !doc.sync.enabled {
        return Ok(SyncPlan {
            job: SyncJob {
                repository,
                branch,
                operations: vec![],
                status: JobStatus::Pending,
            },
            enabled: false,
            diffs: vec![],
            conflicts: vec![],
            baseline_updates: Baseline::new(),
        });
    }

    let tree = RepoTree::snapshot(target_root)?;
    // The full set is the reference for cleanup and override decisions;
    // the scope only narrows what gets written.
    let template_paths = templates.paths();
    let scoped = templates.scoped(scope);
    let mut operations: Vec<FileOperation> = Vec::new();
    let mut diffs: Vec<FileDiff> = Vec::new();
    let mut conflicts: Vec<ConflictError> = Vec::new();
    let mut baseline_updates = Baseline::new();

    // Template files: skip / write / protect.
    for (rel, content) in scoped.iter() {
        let decision = overrides::decide(rel, doc, &template_paths);
        if decision.excluded {
            operations.push(FileOperation::Skip {
                path: rel.clone(),
                reason: format!(
                    "excluded: {}",
                    decision.reason.unwrap_or_else(|| "no reason".into())
                ),
            });
            continue;
        }

        let existing = tree.read_file(rel)?;
        let changed = match &existing {
            Some(current) => {
                conflict::content_digest(current) != conflict::content_digest(content)
            }
            None => true,
        };
        if !changed {
            continue;
        }

        if decision.protected {
            operations.push(FileOperation::Skip {
                path: rel.clone(),
                reason: format!(
                    "protected: {}",
                    decision.reason.unwrap_or_else(|| "no reason".into())
                ),
            });
            continue;
        }

        diffs.push(unified_diff(rel, existing.as_deref().unwrap_or(""), content));
        operations.push(FileOperation::Write {
            path: rel.clone(),
            content: content.clone(),
        });
    }

    // Mirrored document pairs: at most one direction per run.
    let mut mirror_paths: BTreeSet<PathBuf> = BTreeSet::new();
    for pair in mirrors {
        mirror_paths.insert(pair.path_a.clone());
        mirror_paths.insert(pair.path_b.clone());

        let a_excluded = overrides::decide(&pair.path_a, doc, &template_paths).excluded;
        let b_excluded = overrides::decide(&pair.path_b, doc, &template_paths).excluded;
        if a_excluded || b_excluded {
            continue;
        }

        let content_a = tree.read_file(&pair.path_a)?;
        let content_b = tree.read_file(&pair.path_b)?;
        let side_a = mirror_side(&pair.path_a, content_a.as_deref(), baseline);
        let side_b = mirror_side(&pair.path_b, content_b.as_deref(), baseline);

        match conflict::resolve(&side_a, &side_b) {
            Ok(SyncDirection::None) => {
                record_baseline(&mut baseline_updates, &pair.path_a, content_a.as_deref());
                record_baseline(&mut baseline_updates, &pair.path_b, content_b.as_deref());
            }
            Ok(SyncDirection::CopyAToB) => {
                push_mirror_op(
                    &mut operations,
                    &mut diffs,
                    &pair.path_b,
                    content_b.as_deref(),
                    content_a.as_deref(),
                );
                record_baseline(&mut baseline_updates, &pair.path_a, content_a.as_deref());
                record_baseline(&mut baseline_updates, &pair.path_b, content_a.as_deref());
            }
            Ok(SyncDirection::CopyBToA) => {
                push_mirror_op(
                    &mut operations,
                    &mut diffs,
                    &pair.path_a,
                    content_a.as_deref(),
                    content_b.as_deref(),
                );
                record_baseline(&mut baseline_updates, &pair.path_a, content_b.as_deref());
                record_baseline(&mut baseline_updates, &pair.path_b, content_b.as_deref());
            }
            Err(conflict) => conflicts.push(conflict),
        }
    }

    // Cleanup candidates: present in the target, absent from the template set.
    for rel in tree.files() {
        if template_paths.contains(rel) || mirror_paths.contains(rel) {
            continue;
        }
        let decision = overrides::decide(rel, doc, &template_paths);
        if decision.allow_cleanup_deletion {
            operations.push(FileOperation::Delete { path: rel.clone() });
        }
    }

    let status = if conflicts.is_empty() {
        JobStatus::Pending
    } else {
        JobStatus::Conflicted
    };

    tracing::debug!(
        repository = %repository,
        writes = operations.iter().filter(|o| matches!(o, FileOperation::Write { .. })).count(),
        conflicts = conflicts.len(),
        "planned sync"
    );

    Ok(SyncPlan {
        job: SyncJob {
            repository,
            branch,
            operations,
            status,
        },
        enabled: true,
        diffs,
        conflicts,
        baseline_updates,
    })
}

fn mirror_side(path: &Path, content: Option<&str>, baseline: &BaselineFile) -> MirrorSide {
    let key = path.to_string_lossy().to_string();
    MirrorSide {
        path: path.to_path_buf(),
        digest: content.map(conflict::content_digest),
        last_synced: baseline.files.get(&key).cloned(),
    }
}

fn record_baseline(updates: &mut Baseline, path: &Path, content: Option<&str>) {
    if let Some(content) = content {
        updates.insert(
            path.to_string_lossy().to_string(),
            conflict::content_digest(content),
        );
    }
}

fn push_mirror_op(
    operations: &mut Vec<FileOperation>,
    diffs: &mut Vec<FileDiff>,
    dest: &Path,
    dest_content: Option<&str>,
    source_content: Option<&str>,
) {
    match source_content {
        Some(content) => {
            diffs.push(unified_diff(dest, dest_content.unwrap_or(""), content));
            operations.push(FileOperation::Write {
                path: dest.to_path_buf(),
                content: content.to_string(),
            });
        }
        // The changed side was deleted; the deletion flows to the mirror.
        None => operations.push(FileOperation::Delete {
            path: dest.to_path_buf(),
        }),
    }
}

fn unified_diff(path: &Path, old: &str, new: &str) -> FileDiff {
    let old = old.replace("\r\n", "\n");
    let new = new.replace("\r\n", "\n");
    let old_header = format!("a/{}", path.display());
    let new_header = format!("b/{}", path.display());
    let unified = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    FileDiff {
        path: path.to_path_buf(),
        unified_diff: unified,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
