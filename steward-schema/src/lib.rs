//! # steward-schema
//!
//! Declarative repository-structure schemas: document loading, `extends`
//! merge resolution, per-repository override handling, and repository-type
//! detection.
//!
//! Call [`loader::load_at`] to produce a flattened, immutable
//! [`types::SchemaDefinition`] from a base document plus an optional
//! override, or [`detect::detect_repository_type`] to classify a target
//! working copy when no explicit override tag is present.

pub mod detect;
pub mod error;
pub mod loader;
pub mod types;

pub use error::SchemaError;
pub use types::{
    CheckRule, ComplianceCheck, EntryKind, HealthThreshold, MirrorPair, RequiredEntry,
    SchemaDefinition,
};
