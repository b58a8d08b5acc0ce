//! # steward-core
//!
//! Shared domain types for the steward workspace: repository identity
//! newtypes, override documents, file operations, and sync job state.

pub mod types;
