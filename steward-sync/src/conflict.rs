//! Dual-location document conflict resolution.
//!
//! State machine with three states:
//! 1. `InSync` — neither side changed since the last sync → no-op.
//! 2. `OneSided` — exactly one side changed → copy changed → unchanged,
//!    terminal success.
//! 3. `BothChanged` — terminal failure, [`ConflictError`], no automatic
//!    resolution attempted.
//!
//! "Changed" is judged against the last-synced SHA-256 digest recorded in
//! the baseline store; content digests are taken over LF-normalised bytes so
//! CRLF round-trips do not register as edits.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::error::ConflictError;

/// One side of a mirrored document pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSide {
    pub path: PathBuf,
    /// Digest of the current content; `None` when the file is absent.
    pub digest: Option<String>,
    /// Digest recorded at the last successful sync; `None` when never synced.
    pub last_synced: Option<String>,
}

impl MirrorSide {
    fn changed(&self) -> bool {
        match (&self.digest, &self.last_synced) {
            (current, Some(last)) => current.as_deref() != Some(last.as_str()),
            // Never synced: any present content counts as a change.
            (Some(_), None) => true,
            (None, None) => false,
        }
    }
}

/// Which way content flows for a mirrored pair this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Nothing to do.
    None,
    /// Copy the first side over the second.
    CopyAToB,
    /// Copy the second side over the first.
    CopyBToA,
}

/// Resolve the sync direction for one mirrored pair.
///
/// Symmetric: swapping the arguments yields the mirrored direction or the
/// same `BothChanged` outcome. At most one direction is ever taken per run.
pub fn resolve(a: &MirrorSide, b: &MirrorSide) -> Result<SyncDirection, ConflictError> {
    // Identical current content is in sync no matter what the baselines say.
    if a.digest == b.digest {
        return Ok(SyncDirection::None);
    }

    match (a.changed(), b.changed()) {
        (false, false) => Ok(SyncDirection::None),
        (true, false) => Ok(SyncDirection::CopyAToB),
        (false, true) => Ok(SyncDirection::CopyBToA),
        (true, true) => Err(ConflictError {
            path_a: a.path.display().to_string(),
            path_b: b.path.display().to_string(),
        }),
    }
}

/// SHA-256 hex digest over LF-normalised content.
pub fn content_digest(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn side(path: &str, content: Option<&str>, last: Option<&str>) -> MirrorSide {
        MirrorSide {
            path: PathBuf::from(path),
            digest: content.map(content_digest),
            last_synced: last.map(content_digest),
        }
    }

    #[test]
    fn unchanged_both_sides_is_in_sync() {
        let a = side("README.md", Some("v1"), Some("v1"));
        let b = side("docs/README.md", Some("v1"), Some("v1"));
        assert_eq!(resolve(&a, &b).expect("resolve"), SyncDirection::None);
    }

    #[test]
    fn root_changed_mirror_unchanged_copies_root_to_mirror() {
        let a = side("README.md", Some("v2"), Some("v1"));
        let b = side("docs/README.md", Some("v1"), Some("v1"));
        assert_eq!(resolve(&a, &b).expect("resolve"), SyncDirection::CopyAToB);
    }

    #[test]
    fn mirror_changed_root_unchanged_copies_mirror_to_root() {
        let a = side("README.md", Some("v1"), Some("v1"));
        let b = side("docs/README.md", Some("v2"), Some("v1"));
        assert_eq!(resolve(&a, &b).expect("resolve"), SyncDirection::CopyBToA);
    }

    #[test]
    fn both_changed_is_a_terminal_conflict() {
        let a = side("README.md", Some("v2"), Some("v1"));
        let b = side("docs/README.md", Some("v3"), Some("v1"));
        let err = resolve(&a, &b).expect_err("conflict");
        assert!(err.path_a.contains("README.md"));
        assert!(err.path_b.contains("docs/README.md"));
    }

    #[test]
    fn resolution_is_symmetric() {
        let a = side("README.md", Some("v2"), Some("v1"));
        let b = side("docs/README.md", Some("v1"), Some("v1"));

        let forward = resolve(&a, &b).expect("forward");
        let swapped = resolve(&b, &a).expect("swapped");
        assert_eq!(forward, SyncDirection::CopyAToB);
        assert_eq!(swapped, SyncDirection::CopyBToA);

        let c = side("README.md", Some("v2"), Some("v1"));
        let d = side("docs/README.md", Some("v3"), Some("v1"));
        assert!(resolve(&c, &d).is_err());
        assert!(resolve(&d, &c).is_err());
    }

    #[test]
    fn identical_content_with_stale_baselines_is_in_sync() {
        // Both digests moved, but they moved to the same content: nothing
        // to copy, and no conflict to raise.
        let a = side("README.md", Some("v2"), Some("v1"));
        let b = side("docs/README.md", Some("v2"), Some("v1"));
        assert_eq!(resolve(&a, &b).expect("resolve"), SyncDirection::None);
    }

    #[test]
    fn never_synced_differing_copies_conflict() {
        let a = side("README.md", Some("v1"), None);
        let b = side("docs/README.md", Some("v2"), None);
        assert!(resolve(&a, &b).is_err());
    }

    #[test]
    fn never_synced_single_copy_flows_to_missing_side() {
        let a = side("README.md", Some("v1"), None);
        let b = side("docs/README.md", None, None);
        assert_eq!(resolve(&a, &b).expect("resolve"), SyncDirection::CopyAToB);
    }

    #[test]
    fn crlf_and_lf_share_a_digest() {
        assert_eq!(content_digest("a\r\nb\r\n"), content_digest("a\nb\n"));
    }
}
