//! Deterministic repository tree snapshot.
//!
//! A [`RepoTree`] captures the relative file and directory paths under a
//! working copy root at one point in time, sorted and deduplicated, so that
//! evaluation over the snapshot is reproducible. File contents are read on
//! demand through the snapshot, never by probing paths ad hoc.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, HealthError};

/// Directories never included in a snapshot.
const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target", "vendor"];

/// Snapshot of a repository's file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTree {
    root: PathBuf,
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl RepoTree {
    /// Walk `root` and capture every file and directory path relative to it.
    ///
    /// Traversal order is sorted, so two snapshots of identical trees are
    /// equal.
    pub fn snapshot(root: &Path) -> Result<Self, HealthError> {
        let mut files = BTreeSet::new();
        let mut dirs = BTreeSet::new();

        let mut pending = vec![root.to_path_buf()];
        while let Some(current) = pending.pop() {
            let entries = match std::fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(io_err(&current, err)),
            };
            let mut children: Vec<PathBuf> = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| io_err(&current, e))?;
                children.push(entry.path());
            }
            children.sort();

            for child in children {
                let relative = child.strip_prefix(root).unwrap_or(&child).to_path_buf();
                let file_type = std::fs::symlink_metadata(&child)
                    .map_err(|e| io_err(&child, e))?
                    .file_type();
                if file_type.is_dir() {
                    let name = relative
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    if IGNORED_DIRS.contains(&name.as_str()) {
                        continue;
                    }
                    dirs.insert(relative);
                    pending.push(child);
                } else if file_type.is_file() {
                    files.insert(relative);
                }
                // Symlinks are ignored: a snapshot never follows them.
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            files,
            dirs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains_file(&self, relative: &Path) -> bool {
        self.files.contains(relative)
    }

    pub fn contains_dir(&self, relative: &Path) -> bool {
        self.dirs.contains(relative)
    }

    /// Sorted relative paths of every file in the snapshot.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }

    /// Read a snapshotted file's content. Returns `None` for paths that were
    /// not part of the snapshot, even if the file has since appeared.
    pub fn read_file(&self, relative: &Path) -> Result<Option<String>, HealthError> {
        if !self.files.contains(relative) {
            return Ok(None);
        }
        let path = self.root.join(relative);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&path, err)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
