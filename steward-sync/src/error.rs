//! Error types for steward-sync.
//!
//! Propagation policy:
//! - fatal-to-run (`Schema`, `CheckpointCorruption`) stops before any
//!   repository is mutated;
//! - fatal-to-item (`Conflict`, `Permission`) is isolated and reported, the
//!   batch continues;
//! - `Network` is retried with bounded backoff before becoming a failed
//!   checkpoint entry.

use std::path::PathBuf;

use thiserror::Error;

/// Both copies of a mirrored document changed since the last sync.
///
/// Terminal for that sync item: the engine must never silently pick a
/// winner. Surfaced to the operator for manual resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("both '{path_a}' and '{path_b}' changed since last sync; resolve manually")]
pub struct ConflictError {
    pub path_a: String,
    pub path_b: String,
}

/// All errors that can arise from planning and executing syncs.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or incomplete schema — fatal, aborts the whole run.
    #[error("schema error: {0}")]
    Schema(#[from] steward_schema::SchemaError),

    /// An error from tree snapshotting.
    #[error("tree error: {0}")]
    Health(#[from] steward_health::HealthError),

    /// Both sides of a mirrored file changed — fatal for that item only.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Transient network failure — retried with bounded backoff.
    #[error("network error: {detail}")]
    Network { detail: String },

    /// Fatal for the repository, never retried.
    #[error("permission denied: {detail}")]
    Permission { detail: String },

    /// Checkpoint state cannot be trusted — fatal for the whole run; the
    /// engine refuses to proceed rather than risk duplicate or lost work.
    #[error("checkpoint store corrupt at {path}: {detail}")]
    CheckpointCorruption { path: PathBuf, detail: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (checkpoint and baseline stores).
    #[error("state store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// True for errors worth retrying transparently.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network { .. })
    }

    /// True for errors that must abort the whole batch before mutation.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            SyncError::Schema(_) | SyncError::CheckpointCorruption { .. }
        )
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_classification() {
        assert!(SyncError::Network {
            detail: "timeout".into()
        }
        .is_retryable());
        assert!(!SyncError::Permission {
            detail: "403".into()
        }
        .is_retryable());
    }

    #[test]
    fn fatal_to_run_classification() {
        let corrupt = SyncError::CheckpointCorruption {
            path: PathBuf::from("/tmp/batch.json"),
            detail: "truncated".into(),
        };
        assert!(corrupt.is_fatal_to_run());
        assert!(!SyncError::Network {
            detail: "reset".into()
        }
        .is_fatal_to_run());
    }
}
