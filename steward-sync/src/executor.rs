//! Sync execution: apply a planned job to a working copy and land it on the
//! host as a commit and pull request.
//!
//! Ordering per repository: branch, apply operations, commit, push, PR
//! upsert. A plan with zero mutations completes without touching the host
//! at all, so re-running a clean batch produces no commits and no duplicate
//! pull requests. Host writes go through the shared [`RateLimiter`];
//! transient network failures are retried with bounded exponential backoff.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use steward_core::types::{FileOperation, JobStatus, RepoName, SyncJob};

use crate::host::{HostError, RepoHost};
use crate::limit::RateLimiter;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Operator-supplied text for the landing commit and pull request.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            commit_message: "chore: sync repository standards".into(),
            pr_title: "Sync repository standards".into(),
            pr_body: "Automated standards synchronization.".into(),
        }
    }
}

/// Terminal status of one repository in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Completed,
    Failed,
    Conflicted,
    Skipped,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Completed => write!(f, "completed"),
            OutcomeStatus::Failed => write!(f, "failed"),
            OutcomeStatus::Conflicted => write!(f, "conflicted"),
            OutcomeStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// What happened to one repository.
#[derive(Debug, Clone)]
pub struct RepoOutcome {
    pub repository: RepoName,
    pub status: OutcomeStatus,
    pub written: usize,
    pub deleted: usize,
    pub skipped_files: usize,
    pub pr_number: Option<u64>,
    pub detail: Option<String>,
}

impl RepoOutcome {
    pub fn skipped(repository: RepoName, detail: impl Into<String>) -> Self {
        Self {
            repository,
            status: OutcomeStatus::Skipped,
            written: 0,
            deleted: 0,
            skipped_files: 0,
            pr_number: None,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(repository: RepoName, detail: impl Into<String>) -> Self {
        Self {
            repository,
            status: OutcomeStatus::Failed,
            written: 0,
            deleted: 0,
            skipped_files: 0,
            pr_number: None,
            detail: Some(detail.into()),
        }
    }
}

/// Retry a retryable host call up to [`MAX_ATTEMPTS`] times with exponential
/// backoff. Non-retryable errors surface immediately.
pub(crate) async fn with_retry<T, F, Fut>(what: &str, mut call: F) -> Result<T, HostError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HostError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
                tracing::warn!(%err, what, attempt, "retrying host call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Execute one planned job against its working copy.
///
/// The caller has already planned and conflict-checked the job; a
/// `Conflicted` job must not reach this function.
pub async fn execute(
    job: &SyncJob,
    workspace: &Path,
    host: &dyn RepoHost,
    limiter: &RateLimiter,
    opts: &ExecOptions,
) -> RepoOutcome {
    debug_assert_ne!(job.status, JobStatus::Conflicted);

    let repo = &job.repository;
    let skipped_files = job
        .operations
        .iter()
        .filter(|o| matches!(o, FileOperation::Skip { .. }))
        .count();

    if job.mutation_count() == 0 {
        tracing::info!(repository = %repo, "nothing to sync");
        return RepoOutcome {
            repository: repo.clone(),
            status: OutcomeStatus::Completed,
            written: 0,
            deleted: 0,
            skipped_files,
            pr_number: None,
            detail: None,
        };
    }

    match land(job, workspace, host, limiter, opts).await {
        Ok((written, deleted, pr_number)) => {
            tracing::info!(
                repository = %repo,
                written,
                deleted,
                pr = pr_number,
                "sync completed"
            );
            RepoOutcome {
                repository: repo.clone(),
                status: OutcomeStatus::Completed,
                written,
                deleted,
                skipped_files,
                pr_number,
                detail: None,
            }
        }
        Err(err) => {
            tracing::error!(repository = %repo, %err, "sync failed");
            RepoOutcome {
                repository: repo.clone(),
                status: OutcomeStatus::Failed,
                written: 0,
                deleted: 0,
                skipped_files,
                pr_number: None,
                detail: Some(err.to_string()),
            }
        }
    }
}

async fn land(
    job: &SyncJob,
    workspace: &Path,
    host: &dyn RepoHost,
    limiter: &RateLimiter,
    opts: &ExecOptions,
) -> Result<(usize, usize, Option<u64>), HostError> {
    let repo = &job.repository;
    let branch = &job.branch;

    with_retry("create branch", || host.create_branch(repo, branch)).await?;

    let (written, deleted) = apply_operations(job, workspace)?;

    let commit = with_retry("commit", || host.commit_all(repo, &opts.commit_message)).await?;
    if commit.is_none() {
        // The working copy already matched; nothing to push.
        return Ok((written, deleted, None));
    }

    limiter.acquire().await;
    with_retry("push", || host.push(repo, branch)).await?;

    limiter.acquire().await;
    let existing = with_retry("find pr", || host.find_open_pr(repo, branch)).await?;
    let pr_number = match existing {
        Some(pr) => {
            limiter.acquire().await;
            with_retry("update pr", || {
                host.update_pr(repo, pr.number, &opts.pr_title, &opts.pr_body)
            })
            .await?;
            pr.number
        }
        None => {
            limiter.acquire().await;
            let pr = with_retry("open pr", || {
                host.open_pr(repo, branch, &opts.pr_title, &opts.pr_body)
            })
            .await?;
            pr.number
        }
    };

    Ok((written, deleted, Some(pr_number)))
}

/// Apply the job's file operations to the working copy. Writes are atomic
/// (`.tmp` + rename); deleting an already-absent file is not an error.
fn apply_operations(job: &SyncJob, workspace: &Path) -> Result<(usize, usize), HostError> {
    let mut written = 0;
    let mut deleted = 0;
    for op in &job.operations {
        match op {
            FileOperation::Write { path, content } => {
                atomic_write(&workspace.join(path), content)?;
                written += 1;
            }
            FileOperation::Delete { path } => {
                let target = workspace.join(path);
                match std::fs::remove_file(&target) {
                    Ok(()) => deleted += 1,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(HostError::Io {
                            path: target,
                            source: err,
                        })
                    }
                }
            }
            FileOperation::Skip { path, reason } => {
                tracing::debug!(path = %path.display(), reason, "skipping");
            }
        }
    }
    Ok((written, deleted))
}

fn atomic_write(path: &Path, content: &str) -> Result<(), HostError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| host_io(parent, e))?;
    }
    let tmp = path.with_extension("steward-tmp");
    std::fs::write(&tmp, content).map_err(|e| host_io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| host_io(path, e))?;
    Ok(())
}

fn host_io(path: &Path, source: std::io::Error) -> HostError {
    HostError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tempfile::TempDir;

    use steward_core::types::BranchName;

    use crate::host::{HostEvent, LocalWorkspaceHost};

    use super::*;

    fn job(operations: Vec<FileOperation>) -> SyncJob {
        SyncJob {
            repository: RepoName::from("demo"),
            branch: BranchName::from("chore/steward-sync"),
            operations,
            status: JobStatus::Pending,
        }
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(100, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn zero_mutation_job_touches_no_host_state() {
        let tmp = TempDir::new().unwrap();
        let host = LocalWorkspaceHost::new(tmp.path());
        let job = job(vec![FileOperation::Skip {
            path: PathBuf::from("README.md"),
            reason: "protected".into(),
        }]);

        let outcome = execute(&job, tmp.path(), &host, &limiter(), &ExecOptions::default()).await;
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.pr_number, None);
        assert!(host.events().is_empty(), "no commit and no PR on a no-op");
    }

    #[tokio::test]
    async fn writes_land_as_branch_commit_push_pr() {
        let tmp = TempDir::new().unwrap();
        let workspace = tmp.path().join("demo");
        std::fs::create_dir(&workspace).unwrap();
        let host = LocalWorkspaceHost::new(tmp.path());
        let job = job(vec![
            FileOperation::Write {
                path: PathBuf::from("LICENSE"),
                content: "MIT\n".into(),
            },
            FileOperation::Write {
                path: PathBuf::from(".github/workflows/ci.yml"),
                content: "on: push\n".into(),
            },
        ]);

        let outcome = execute(&job, &workspace, &host, &limiter(), &ExecOptions::default()).await;
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.pr_number, Some(1));
        assert_eq!(
            std::fs::read_to_string(workspace.join("LICENSE")).unwrap(),
            "MIT\n"
        );
        assert_eq!(
            std::fs::read_to_string(workspace.join(".github/workflows/ci.yml")).unwrap(),
            "on: push\n"
        );

        let events = host.events();
        assert!(matches!(events[0], HostEvent::BranchCreated { .. }));
        assert!(matches!(events[1], HostEvent::Committed { .. }));
        assert!(matches!(events[2], HostEvent::Pushed { .. }));
        assert!(matches!(events[3], HostEvent::PrOpened { number: 1, .. }));
    }

    #[tokio::test]
    async fn rerun_updates_existing_pr_instead_of_opening_a_second() {
        let tmp = TempDir::new().unwrap();
        let workspace = tmp.path().join("demo");
        std::fs::create_dir(&workspace).unwrap();
        let host = LocalWorkspaceHost::new(tmp.path());
        let write = job(vec![FileOperation::Write {
            path: PathBuf::from("LICENSE"),
            content: "MIT\n".into(),
        }]);

        let first = execute(&write, &workspace, &host, &limiter(), &ExecOptions::default()).await;
        let second = execute(&write, &workspace, &host, &limiter(), &ExecOptions::default()).await;
        assert_eq!(first.pr_number, Some(1));
        assert_eq!(second.pr_number, Some(1), "second run must reuse the PR");

        let opened = host
            .events()
            .iter()
            .filter(|e| matches!(e, HostEvent::PrOpened { .. }))
            .count();
        assert_eq!(opened, 1);
    }

    #[tokio::test]
    async fn delete_of_absent_file_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let workspace = tmp.path().join("demo");
        std::fs::create_dir(&workspace).unwrap();
        let host = LocalWorkspaceHost::new(tmp.path());
        let job = job(vec![FileOperation::Delete {
            path: PathBuf::from("scripts/gone.sh"),
        }]);

        let outcome = execute(&job, &workspace, &host, &limiter(), &ExecOptions::default()).await;
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.deleted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_are_retried_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = with_retry("flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(HostError::Network {
                    detail: "reset".into(),
                })
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("down", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HostError::Network {
                detail: "unreachable".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn permission_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("denied", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HostError::Permission {
                detail: "403".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
