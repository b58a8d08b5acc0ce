//! Baseline store — SHA-256 last-synced digests per repository.
//!
//! Persists a `BaselineFile` JSON document at
//! `<state_dir>/baselines/<repo>.json`. The recorded digests are what the
//! conflict resolver and planner compare current content against; writes use
//! an atomic `.tmp` + rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use steward_core::types::RepoName;

use crate::error::{io_err, SyncError};

/// Maps repository-relative path strings to their last-synced SHA-256 hex digest.
pub type Baseline = HashMap<String, String>;

/// On-disk baseline payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaselineFile {
    pub synced_at: DateTime<Utc>,
    pub files: Baseline,
}

impl BaselineFile {
    pub fn empty() -> Self {
        Self {
            synced_at: Utc::now(),
            files: HashMap::new(),
        }
    }
}

/// `<state_dir>/baselines/<repo>.json` — pure, no I/O.
pub fn store_path_at(state_dir: &Path, repo: &RepoName) -> PathBuf {
    state_dir.join("baselines").join(format!("{repo}.json"))
}

/// Load the baseline for `repo`.
///
/// Returns an empty baseline if the file does not yet exist.
pub fn load_at(state_dir: &Path, repo: &RepoName) -> Result<BaselineFile, SyncError> {
    let path = store_path_at(state_dir, repo);
    if !path.exists() {
        return Ok(BaselineFile::empty());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the baseline for `repo` atomically.
pub fn save_at(state_dir: &Path, repo: &RepoName, baseline: &BaselineFile) -> Result<(), SyncError> {
    let path = store_path_at(state_dir, repo);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid baseline store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(baseline)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}
