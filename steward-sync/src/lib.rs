//! Bulk synchronization engine: planning, conflict resolution, execution,
//! checkpointed batch runs.
//!
//! Flow per repository: acquire working copy → resolve overrides → plan
//! (template diffing, mirrored-document resolution, cleanup gating) →
//! execute (branch, apply, commit, push, PR upsert). The batch runner drives
//! a bounded worker pool over the target list with durable checkpoints for
//! resume.

pub mod baseline;
pub mod checkpoint;
pub mod conflict;
pub mod error;
pub mod executor;
pub mod host;
pub mod limit;
pub mod overrides;
pub mod planner;
pub mod runner;

pub use error::{ConflictError, SyncError};
pub use executor::{ExecOptions, OutcomeStatus, RepoOutcome};
pub use host::{HostError, LocalWorkspaceHost, PullRequest, RepoHost};
pub use limit::RateLimiter;
pub use planner::{FileDiff, SyncPlan, TemplateScope, TemplateSet};
pub use runner::{BatchConfig, BatchSummary, RepoTarget};
