//! `steward sync` — bulk standards synchronization across an organization.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use steward_core::types::BranchName;
use steward_schema::loader;
use steward_sync::planner::TemplateSet;
use steward_sync::runner::{self, BatchConfig};
use steward_sync::{ExecOptions, LocalWorkspaceHost, OutcomeStatus, RepoHost, RepoOutcome};

use super::{default_state_dir, discover_targets};

/// Arguments for `steward sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Directory containing the organization's working copies.
    #[arg(long)]
    pub org: PathBuf,

    /// Only sync these repositories (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Repositories to leave out (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Branch to land changes on.
    #[arg(long, default_value = "chore/steward-sync")]
    pub branch: String,

    /// Commit message for landed changes.
    #[arg(long, default_value = "chore: sync repository standards")]
    pub commit_message: String,

    /// Pull request title.
    #[arg(long, default_value = "Sync repository standards")]
    pub pr_title: String,

    /// Pull request body.
    #[arg(long, default_value = "Automated standards synchronization.")]
    pub pr_body: String,

    /// Only documentation and configuration files.
    #[arg(long, conflicts_with = "scripts_only")]
    pub files_only: bool,

    /// Only workflow and script files.
    #[arg(long)]
    pub scripts_only: bool,

    /// Plan everything, mutate nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Worker pool size.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Resume the batch with this checkpoint key.
    #[arg(long)]
    pub resume: Option<String>,

    /// On resume, leave previously failed repositories alone.
    #[arg(long)]
    pub skip_failed: bool,

    /// Directory containing schema documents.
    #[arg(long, default_value = "schemas")]
    pub schema_dir: PathBuf,

    /// Schema document name (file stem).
    #[arg(long, default_value = "standards")]
    pub schema: String,

    /// Directory containing the rendered template files.
    #[arg(long, default_value = "templates")]
    pub templates: PathBuf,

    /// Where checkpoints and baselines live.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

impl SyncArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let schema = loader::load_at(&self.schema_dir, &self.schema, None)
            .with_context(|| format!("cannot load schema '{}'", self.schema))?;
        let templates = TemplateSet::load(&self.templates)
            .with_context(|| format!("cannot load templates from '{}'", self.templates.display()))?;
        let targets = discover_targets(&self.org, &self.repos, &self.exclude)?;
        if targets.is_empty() {
            println!("No repositories found under '{}'.", self.org.display());
            return Ok(ExitCode::SUCCESS);
        }

        if !self.yes && !self.dry_run && !confirm(targets.len(), &self.branch)? {
            println!("aborted");
            return Ok(ExitCode::SUCCESS);
        }

        let branch = BranchName::from(self.branch.as_str());
        let mut config = BatchConfig::new(
            self.state_dir.clone().unwrap_or_else(default_state_dir),
            branch,
        );
        config.exec = ExecOptions {
            commit_message: self.commit_message.clone(),
            pr_title: self.pr_title.clone(),
            pr_body: self.pr_body.clone(),
        };
        config.workers = self.workers;
        config.dry_run = self.dry_run;
        config.skip_failed = self.skip_failed;
        config.scope = super::plan::scope(self.files_only, self.scripts_only);
        if let Some(key) = &self.resume {
            config.batch_key = key.clone();
        }

        let host: Arc<dyn RepoHost> = Arc::new(LocalWorkspaceHost::new(&self.org));
        let summary = runner::run_batch(&schema, &templates, targets, host, &config)
            .await
            .context("batch run failed")?;

        print_summary(&summary.outcomes, self.dry_run);
        println!(
            "{} completed, {} failed, {} conflicted, {} skipped (checkpoint key: {})",
            summary.completed().to_string().green(),
            summary.failed().to_string().red(),
            summary.conflicted().to_string().yellow(),
            summary.skipped(),
            config.batch_key,
        );

        if summary.has_failures() {
            Ok(ExitCode::from(1))
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn confirm(count: usize, branch: &str) -> Result<bool> {
    print!("Sync {count} repositories on branch '{branch}'? [y/N] ");
    std::io::stdout().flush().context("cannot flush stdout")?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("cannot read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "written")]
    written: usize,
    #[tabled(rename = "deleted")]
    deleted: usize,
    #[tabled(rename = "pr")]
    pr: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_summary(outcomes: &[RepoOutcome], dry_run: bool) {
    if dry_run {
        println!("{}", "[dry-run] no changes were made".bold());
    }
    let rows: Vec<OutcomeRow> = outcomes
        .iter()
        .map(|outcome| OutcomeRow {
            repository: outcome.repository.to_string(),
            status: status_label(outcome.status),
            written: outcome.written,
            deleted: outcome.deleted,
            pr: outcome
                .pr_number
                .map(|n| format!("#{n}"))
                .unwrap_or_else(|| "-".to_string()),
            detail: outcome.detail.clone().unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn status_label(status: OutcomeStatus) -> String {
    match status {
        OutcomeStatus::Completed => "completed".green().to_string(),
        OutcomeStatus::Failed => "failed".red().bold().to_string(),
        OutcomeStatus::Conflicted => "conflicted".yellow().bold().to_string(),
        OutcomeStatus::Skipped => "skipped".bright_black().to_string(),
    }
}
