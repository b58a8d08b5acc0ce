//! Error types for steward-health.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from tree snapshotting and evaluation.
#[derive(Debug, Error)]
pub enum HealthError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`HealthError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HealthError {
    HealthError::Io {
        path: path.into(),
        source,
    }
}
