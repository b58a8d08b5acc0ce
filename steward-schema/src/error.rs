//! Error types for steward-schema.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from schema loading and merging.
///
/// Every variant is fatal to the run: a malformed schema aborts before any
/// repository is touched.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse schema at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required top-level section is absent from the document.
    #[error("schema '{name}' is missing required section '{section}'")]
    MissingSection { name: String, section: String },

    /// Two checks share the same id after merging.
    #[error("duplicate compliance check id '{id}'")]
    DuplicateCheckId { id: String },

    /// Threshold ranges do not form a contiguous, non-overlapping 0–100 cover.
    #[error("invalid health thresholds: {detail}")]
    InvalidThresholds { detail: String },

    /// An `extends` reference could not be resolved.
    #[error("extends target '{name}' not found at {path}")]
    ExtendsNotFound { name: String, path: PathBuf },

    /// Circular `extends` chain detected during the merge pass.
    #[error("circular extends chain: {chain}")]
    CircularExtends { chain: String },
}

/// Convenience constructor for [`SchemaError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SchemaError {
    SchemaError::Io {
        path: path.into(),
        source,
    }
}
