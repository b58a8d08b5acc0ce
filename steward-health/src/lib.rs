//! # steward-health
//!
//! Compliance evaluation: snapshot a target repository's file tree and score
//! it against a flattened schema, producing an immutable [`HealthReport`].
//!
//! Call [`tree::RepoTree::snapshot`] then [`evaluate::evaluate`]; render the
//! result with [`report::render_text`] or serialize it as JSON.

pub mod error;
pub mod evaluate;
pub mod report;
pub mod tree;

pub use error::HealthError;
pub use evaluate::{evaluate, CategoryScore, HealthReport};
pub use tree::RepoTree;
