//! Bulk batch runner.
//!
//! Topology: the target list feeds an mpsc job queue consumed by a bounded
//! pool of workers; every worker reports checkpoint transitions to a single
//! writer task that owns the [`CheckpointStore`], so checkpoint writes are
//! serialized without locking. A broadcast channel carries cancellation;
//! workers observe it only between repositories, never mid-repository, so a
//! cancelled run leaves no half-applied working copy.
//!
//! One repository's failure never stops the batch: the failure is
//! checkpointed and reported, and the remaining targets proceed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};

use steward_core::types::{BranchName, OverrideDocument, RepoName};
use steward_schema::SchemaDefinition;

use crate::baseline;
use crate::checkpoint::CheckpointStore;
use crate::error::SyncError;
use crate::executor::{self, ExecOptions, OutcomeStatus, RepoOutcome};
use crate::host::RepoHost;
use crate::limit::RateLimiter;
use crate::overrides;
use crate::planner::{self, TemplateScope, TemplateSet};

/// One repository to process in a batch.
#[derive(Debug, Clone)]
pub struct RepoTarget {
    pub name: RepoName,
    pub override_doc: OverrideDocument,
}

/// Batch-wide settings.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub branch: BranchName,
    pub exec: ExecOptions,
    pub workers: usize,
    pub dry_run: bool,
    /// On resume, leave previously failed repositories alone instead of
    /// retrying them.
    pub skip_failed: bool,
    /// Global deadline for the whole batch. In-flight repositories finish;
    /// queued repositories are marked skipped once it elapses.
    pub timeout: Option<Duration>,
    pub scope: TemplateScope,
    pub state_dir: PathBuf,
    pub batch_key: String,
    pub rate_capacity: u32,
    pub rate_interval: Duration,
}

impl BatchConfig {
    pub fn new(state_dir: impl Into<PathBuf>, branch: BranchName) -> Self {
        let batch_key = default_batch_key(&branch);
        Self {
            branch,
            exec: ExecOptions::default(),
            workers: 4,
            dry_run: false,
            skip_failed: false,
            timeout: None,
            scope: TemplateScope::All,
            state_dir: state_dir.into(),
            batch_key,
            rate_capacity: 10,
            rate_interval: Duration::from_millis(200),
        }
    }
}

/// Filesystem-safe checkpoint key derived from the sync branch.
pub fn default_batch_key(branch: &BranchName) -> String {
    branch
        .to_string()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect()
}

/// Aggregated result of a batch run.
#[derive(Debug)]
pub struct BatchSummary {
    pub outcomes: Vec<RepoOutcome>,
}

impl BatchSummary {
    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count(OutcomeStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    pub fn conflicted(&self) -> usize {
        self.count(OutcomeStatus::Conflicted)
    }

    pub fn skipped(&self) -> usize {
        self.count(OutcomeStatus::Skipped)
    }

    /// True when any repository failed or conflicted.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || self.conflicted() > 0
    }
}

enum CkptMsg {
    Started(RepoName),
    Completed(RepoName),
    Failed(RepoName, String),
    Conflicted(RepoName, String),
}

struct WorkerCtx {
    schema: Arc<SchemaDefinition>,
    templates: Arc<TemplateSet>,
    host: Arc<dyn RepoHost>,
    limiter: Arc<RateLimiter>,
    config: Arc<BatchConfig>,
    ckpt: Option<mpsc::UnboundedSender<CkptMsg>>,
}

/// Run a batch to completion.
pub async fn run_batch(
    schema: &SchemaDefinition,
    templates: &TemplateSet,
    targets: Vec<RepoTarget>,
    host: Arc<dyn RepoHost>,
    config: &BatchConfig,
) -> Result<BatchSummary, SyncError> {
    let (_cancel_tx, cancel_rx) = broadcast::channel(1);
    run_batch_with_cancel(schema, templates, targets, host, config, cancel_rx).await
}

/// Run a batch, stopping between repositories when `cancel` fires.
pub async fn run_batch_with_cancel(
    schema: &SchemaDefinition,
    templates: &TemplateSet,
    targets: Vec<RepoTarget>,
    host: Arc<dyn RepoHost>,
    config: &BatchConfig,
    mut cancel: broadcast::Receiver<()>,
) -> Result<BatchSummary, SyncError> {
    let mut outcomes: Vec<RepoOutcome> = Vec::new();

    // Workers poll this flag between repositories. A cancel that arrived
    // before the run starts is honored immediately.
    let cancelled = Arc::new(AtomicBool::new(false));
    if cancel.try_recv().is_ok() {
        cancelled.store(true, Ordering::SeqCst);
    } else {
        let flag = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if cancel.recv().await.is_ok() {
                flag.store(true, Ordering::SeqCst);
            }
        });
    }

    // The global deadline behaves exactly like a cancel: workers observe
    // it between repositories, never mid-repository.
    match config.timeout {
        Some(limit) if limit.is_zero() => cancelled.store(true, Ordering::SeqCst),
        Some(limit) => {
            let flag = Arc::clone(&cancelled);
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!(?limit, "batch deadline elapsed");
                flag.store(true, Ordering::SeqCst);
            });
        }
        None => {}
    }

    // Resume filter. Opening a corrupt store aborts before any mutation.
    let store = if config.dry_run {
        None
    } else {
        Some(CheckpointStore::open_at(&config.state_dir, &config.batch_key)?)
    };

    let mut pending: Vec<RepoTarget> = Vec::new();
    for target in targets {
        let key = target.name.to_string();
        match &store {
            Some(store) if store.is_completed(&key) => {
                tracing::info!(repository = %target.name, "already completed, skipping");
                outcomes.push(RepoOutcome::skipped(
                    target.name,
                    "already completed in a previous run",
                ));
            }
            Some(store) if config.skip_failed && store.is_failed(&key) => {
                outcomes.push(RepoOutcome::skipped(
                    target.name,
                    "failed in a previous run (skip-failed)",
                ));
            }
            _ => pending.push(target),
        }
    }

    // Single checkpoint writer owns the store.
    let (ckpt_tx, writer) = match store {
        Some(mut store) => {
            let (tx, mut rx) = mpsc::unbounded_channel::<CkptMsg>();
            let handle = tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let result = match &msg {
                        CkptMsg::Started(repo) => store.mark_started(repo, &repo.to_string()),
                        CkptMsg::Completed(repo) => store.mark_completed(repo, &repo.to_string()),
                        CkptMsg::Failed(repo, detail) => {
                            store.mark_failed(repo, &repo.to_string(), detail)
                        }
                        CkptMsg::Conflicted(repo, detail) => {
                            store.mark_conflicted(repo, &repo.to_string(), detail)
                        }
                    };
                    if let Err(err) = result {
                        tracing::error!(%err, "checkpoint write failed");
                    }
                }
            });
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    let ctx = Arc::new(WorkerCtx {
        schema: Arc::new(schema.clone()),
        templates: Arc::new(templates.clone()),
        host,
        limiter: Arc::new(RateLimiter::new(config.rate_capacity, config.rate_interval)),
        config: Arc::new(config.clone()),
        ckpt: ckpt_tx,
    });

    let (job_tx, job_rx) = mpsc::channel::<RepoTarget>(pending.len().max(1));
    for target in pending {
        // Capacity covers the whole list, so this never blocks.
        if job_tx.send(target).await.is_err() {
            break;
        }
    }
    drop(job_tx);
    let job_rx = Arc::new(Mutex::new(job_rx));

    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<RepoOutcome>();
    let worker_count = ctx.config.workers.max(1);
    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let ctx = Arc::clone(&ctx);
        let jobs = Arc::clone(&job_rx);
        let results = result_tx.clone();
        let cancelled = Arc::clone(&cancelled);
        workers.push(tokio::spawn(async move {
            loop {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let target = { jobs.lock().await.recv().await };
                let Some(target) = target else { break };
                let outcome = process_one(&ctx, target).await;
                if results.send(outcome).is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    for worker in workers {
        if let Err(err) = worker.await {
            tracing::error!(%err, "worker panicked");
        }
    }

    // Targets left in the queue after cancellation were never started.
    {
        let mut jobs = job_rx.lock().await;
        while let Ok(target) = jobs.try_recv() {
            outcomes.push(RepoOutcome::skipped(target.name, "batch cancelled"));
        }
    }

    // Drop the last checkpoint sender and let the writer drain.
    drop(ctx);
    if let Some(writer) = writer {
        if let Err(err) = writer.await {
            tracing::error!(%err, "checkpoint writer panicked");
        }
    }

    while let Some(outcome) = result_rx.recv().await {
        outcomes.push(outcome);
    }
    outcomes.sort_by(|a, b| a.repository.cmp(&b.repository));

    let summary = BatchSummary { outcomes };
    tracing::info!(
        completed = summary.completed(),
        failed = summary.failed(),
        conflicted = summary.conflicted(),
        skipped = summary.skipped(),
        "batch finished"
    );
    Ok(summary)
}

fn checkpoint(ctx: &WorkerCtx, msg: CkptMsg) {
    if let Some(tx) = &ctx.ckpt {
        let _ = tx.send(msg);
    }
}

async fn process_one(ctx: &WorkerCtx, target: RepoTarget) -> RepoOutcome {
    let repo = target.name.clone();
    checkpoint(ctx, CkptMsg::Started(repo.clone()));

    let workspace = match executor::with_retry("acquire workspace", || {
        ctx.host.acquire_workspace(&repo)
    })
    .await
    {
        Ok(path) => path,
        Err(err) => {
            tracing::error!(repository = %repo, %err, "cannot acquire workspace");
            checkpoint(ctx, CkptMsg::Failed(repo.clone(), err.to_string()));
            return RepoOutcome::failed(repo, err.to_string());
        }
    };

    let doc = overrides::merged_with_schema(&target.override_doc, &ctx.schema);
    let baseline = match baseline::load_at(&ctx.config.state_dir, &repo) {
        Ok(baseline) => baseline,
        Err(err) => {
            checkpoint(ctx, CkptMsg::Failed(repo.clone(), err.to_string()));
            return RepoOutcome::failed(repo, err.to_string());
        }
    };

    let plan = match planner::plan(
        &ctx.templates,
        &workspace,
        &doc,
        &ctx.schema.mirrors,
        &baseline,
        repo.clone(),
        ctx.config.branch.clone(),
        ctx.config.scope,
    ) {
        Ok(plan) => plan,
        Err(err) => {
            checkpoint(ctx, CkptMsg::Failed(repo.clone(), err.to_string()));
            return RepoOutcome::failed(repo, err.to_string());
        }
    };

    if !plan.enabled {
        checkpoint(ctx, CkptMsg::Completed(repo.clone()));
        return RepoOutcome::skipped(repo, "sync disabled by override");
    }

    if !plan.conflicts.is_empty() {
        let detail = plan
            .conflicts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        tracing::warn!(repository = %repo, %detail, "mirrored documents conflict");
        checkpoint(ctx, CkptMsg::Conflicted(repo.clone(), detail.clone()));
        return RepoOutcome {
            repository: repo,
            status: OutcomeStatus::Conflicted,
            written: 0,
            deleted: 0,
            skipped_files: plan.skip_count(),
            pr_number: None,
            detail: Some(detail),
        };
    }

    if ctx.config.dry_run {
        return RepoOutcome {
            repository: repo,
            status: OutcomeStatus::Completed,
            written: plan.write_count(),
            deleted: plan.delete_count(),
            skipped_files: plan.skip_count(),
            pr_number: None,
            detail: Some("dry-run".into()),
        };
    }

    let outcome = executor::execute(
        &plan.job,
        &workspace,
        ctx.host.as_ref(),
        &ctx.limiter,
        &ctx.config.exec,
    )
    .await;

    match outcome.status {
        OutcomeStatus::Completed => {
            if !plan.baseline_updates.is_empty() {
                let mut updated = baseline;
                updated.synced_at = chrono::Utc::now();
                updated.files.extend(plan.baseline_updates.clone());
                if let Err(err) = baseline::save_at(&ctx.config.state_dir, &repo, &updated) {
                    tracing::error!(repository = %repo, %err, "baseline save failed");
                }
            }
            checkpoint(ctx, CkptMsg::Completed(repo));
        }
        OutcomeStatus::Failed => {
            let detail = outcome.detail.clone().unwrap_or_else(|| "unknown".into());
            checkpoint(ctx, CkptMsg::Failed(repo, detail));
        }
        OutcomeStatus::Conflicted | OutcomeStatus::Skipped => {}
    }
    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
