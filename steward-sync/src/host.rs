//! Repository host abstraction.
//!
//! The engine only needs a handful of host capabilities: a working copy on
//! local disk, branch/commit/push, and pull-request upsert. [`RepoHost`]
//! keeps the batch machinery independent of any particular VCS platform;
//! [`LocalWorkspaceHost`] serves plain on-disk working copies and records
//! every host call so tests can assert exact side effects.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use steward_core::types::{BranchName, RepoName};

use crate::error::SyncError;

/// Errors surfaced by a repository host.
#[derive(Debug, Error)]
pub enum HostError {
    /// Transient transport failure — safe to retry.
    #[error("network error: {detail}")]
    Network { detail: String },

    /// The credential lacks access — never retried.
    #[error("permission denied: {detail}")]
    Permission { detail: String },

    /// Local filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HostError::Network { .. })
    }
}

impl From<HostError> for SyncError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Network { detail } => SyncError::Network { detail },
            HostError::Permission { detail } => SyncError::Permission { detail },
            HostError::Io { path, source } => SyncError::Io { path, source },
        }
    }
}

/// An open pull request on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub repository: RepoName,
    pub branch: BranchName,
    pub title: String,
    pub body: String,
}

/// The host capabilities the sync engine depends on.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Materialize (or locate) a local working copy for `repo`.
    async fn acquire_workspace(&self, repo: &RepoName) -> Result<PathBuf, HostError>;

    /// Ensure `branch` exists in the working copy and is checked out.
    async fn create_branch(&self, repo: &RepoName, branch: &BranchName) -> Result<(), HostError>;

    /// Commit all pending changes. Returns `None` when there is nothing to
    /// commit.
    async fn commit_all(
        &self,
        repo: &RepoName,
        message: &str,
    ) -> Result<Option<String>, HostError>;

    /// Push `branch` to the host.
    async fn push(&self, repo: &RepoName, branch: &BranchName) -> Result<(), HostError>;

    /// Find an open pull request for `branch`, if any.
    async fn find_open_pr(
        &self,
        repo: &RepoName,
        branch: &BranchName,
    ) -> Result<Option<PullRequest>, HostError>;

    /// Open a new pull request.
    async fn open_pr(
        &self,
        repo: &RepoName,
        branch: &BranchName,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostError>;

    /// Refresh an existing pull request's title and body.
    async fn update_pr(
        &self,
        repo: &RepoName,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<(), HostError>;
}

// ---------------------------------------------------------------------------
// Local workspace host
// ---------------------------------------------------------------------------

/// A recorded host side effect, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    BranchCreated {
        repository: RepoName,
        branch: BranchName,
    },
    Committed {
        repository: RepoName,
        message: String,
        commit: String,
    },
    Pushed {
        repository: RepoName,
        branch: BranchName,
    },
    PrOpened {
        repository: RepoName,
        number: u64,
    },
    PrUpdated {
        repository: RepoName,
        number: u64,
    },
}

/// Host backed by plain directories under a single root: each repository's
/// working copy lives at `<root>/<repo>`. Branches, commits, pushes, and
/// pull requests are tracked in memory.
#[derive(Debug)]
pub struct LocalWorkspaceHost {
    root: PathBuf,
    events: Mutex<Vec<HostEvent>>,
    prs: Mutex<HashMap<(RepoName, BranchName), PullRequest>>,
    next_pr: AtomicU64,
    next_commit: AtomicU64,
}

impl LocalWorkspaceHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            events: Mutex::new(Vec::new()),
            prs: Mutex::new(HashMap::new()),
            next_pr: AtomicU64::new(1),
            next_commit: AtomicU64::new(1),
        }
    }

    /// Every recorded host call, in order.
    pub fn events(&self) -> Vec<HostEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: HostEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl RepoHost for LocalWorkspaceHost {
    async fn acquire_workspace(&self, repo: &RepoName) -> Result<PathBuf, HostError> {
        let path = self.root.join(repo.to_string());
        if !path.is_dir() {
            return Err(HostError::Io {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "working copy not present",
                ),
            });
        }
        Ok(path)
    }

    async fn create_branch(&self, repo: &RepoName, branch: &BranchName) -> Result<(), HostError> {
        self.record(HostEvent::BranchCreated {
            repository: repo.clone(),
            branch: branch.clone(),
        });
        Ok(())
    }

    async fn commit_all(
        &self,
        repo: &RepoName,
        message: &str,
    ) -> Result<Option<String>, HostError> {
        let commit = format!("local-{}", self.next_commit.fetch_add(1, Ordering::SeqCst));
        self.record(HostEvent::Committed {
            repository: repo.clone(),
            message: message.to_string(),
            commit: commit.clone(),
        });
        Ok(Some(commit))
    }

    async fn push(&self, repo: &RepoName, branch: &BranchName) -> Result<(), HostError> {
        self.record(HostEvent::Pushed {
            repository: repo.clone(),
            branch: branch.clone(),
        });
        Ok(())
    }

    async fn find_open_pr(
        &self,
        repo: &RepoName,
        branch: &BranchName,
    ) -> Result<Option<PullRequest>, HostError> {
        let prs = self.prs.lock().map_err(|_| HostError::Network {
            detail: "host state lock poisoned".into(),
        })?;
        Ok(prs.get(&(repo.clone(), branch.clone())).cloned())
    }

    async fn open_pr(
        &self,
        repo: &RepoName,
        branch: &BranchName,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostError> {
        let number = self.next_pr.fetch_add(1, Ordering::SeqCst);
        let pr = PullRequest {
            number,
            repository: repo.clone(),
            branch: branch.clone(),
            title: title.to_string(),
            body: body.to_string(),
        };
        let mut prs = self.prs.lock().map_err(|_| HostError::Network {
            detail: "host state lock poisoned".into(),
        })?;
        prs.insert((repo.clone(), branch.clone()), pr.clone());
        drop(prs);
        self.record(HostEvent::PrOpened {
            repository: repo.clone(),
            number,
        });
        Ok(pr)
    }

    async fn update_pr(
        &self,
        repo: &RepoName,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<(), HostError> {
        let mut prs = self.prs.lock().map_err(|_| HostError::Network {
            detail: "host state lock poisoned".into(),
        })?;
        for pr in prs.values_mut() {
            if pr.repository == *repo && pr.number == number {
                pr.title = title.to_string();
                pr.body = body.to_string();
            }
        }
        drop(prs);
        self.record(HostEvent::PrUpdated {
            repository: repo.clone(),
            number,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn workspace_requires_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let host = LocalWorkspaceHost::new(tmp.path());

        let missing = host.acquire_workspace(&RepoName::from("ghost")).await;
        assert!(missing.is_err());

        std::fs::create_dir(tmp.path().join("real")).unwrap();
        let found = host
            .acquire_workspace(&RepoName::from("real"))
            .await
            .unwrap();
        assert_eq!(found, tmp.path().join("real"));
    }

    #[tokio::test]
    async fn pr_upsert_reuses_open_pr() {
        let tmp = TempDir::new().unwrap();
        let host = LocalWorkspaceHost::new(tmp.path());
        let repo = RepoName::from("demo");
        let branch = BranchName::from("chore/steward-sync");

        assert!(host.find_open_pr(&repo, &branch).await.unwrap().is_none());
        let pr = host
            .open_pr(&repo, &branch, "Sync standards", "body")
            .await
            .unwrap();
        let found = host.find_open_pr(&repo, &branch).await.unwrap().unwrap();
        assert_eq!(found.number, pr.number);

        host.update_pr(&repo, pr.number, "Sync standards (2)", "body 2")
            .await
            .unwrap();
        let updated = host.find_open_pr(&repo, &branch).await.unwrap().unwrap();
        assert_eq!(updated.title, "Sync standards (2)");
    }

    #[test]
    fn retryability_is_network_only() {
        assert!(HostError::Network {
            detail: "reset".into()
        }
        .is_retryable());
        assert!(!HostError::Permission {
            detail: "403".into()
        }
        .is_retryable());
    }
}
