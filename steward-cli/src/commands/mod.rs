pub mod check;
pub mod plan;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use steward_core::types::RepoName;
use steward_schema::loader;
use steward_sync::RepoTarget;

/// Per-repository override document, relative to the working copy root.
pub(crate) const OVERRIDE_FILE: &str = ".steward.yaml";

/// Where checkpoints and baselines live when `--state-dir` is not given.
pub(crate) fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("steward"))
        .unwrap_or_else(|| PathBuf::from(".steward"))
}

/// Enumerate target repositories under `org`: every non-hidden directory,
/// narrowed by `--repos` and `--exclude`, each paired with its override
/// document.
pub(crate) fn discover_targets(
    org: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<RepoTarget>> {
    let entries = std::fs::read_dir(org)
        .with_context(|| format!("cannot read organization directory '{}'", org.display()))?;

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("cannot read entry in '{}'", org.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if !include.is_empty() && !include.contains(&name) {
            continue;
        }
        if exclude.contains(&name) {
            continue;
        }
        names.push(name);
    }
    names.sort();

    for wanted in include {
        if !names.contains(wanted) {
            bail!("repository '{wanted}' not found under '{}'", org.display());
        }
    }

    let mut targets = Vec::with_capacity(names.len());
    for name in names {
        let override_path = org.join(&name).join(OVERRIDE_FILE);
        let override_doc = loader::load_override(&override_path)
            .with_context(|| format!("invalid override document for '{name}'"))?;
        targets.push(RepoTarget {
            name: RepoName::from(name),
            override_doc,
        });
    }
    Ok(targets)
}
