//! `steward plan` — show what a sync would change, per repository.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use steward_core::types::{BranchName, FileOperation};
use steward_schema::loader;
use steward_sync::planner::{self, TemplateScope, TemplateSet};
use steward_sync::{baseline, overrides};

use super::{default_state_dir, discover_targets};

/// Arguments for `steward plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Directory containing the organization's working copies.
    #[arg(long)]
    pub org: PathBuf,

    /// Only plan these repositories (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Repositories to leave out (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Branch the sync would use.
    #[arg(long, default_value = "chore/steward-sync")]
    pub branch: String,

    /// Only documentation and configuration files.
    #[arg(long, conflicts_with = "scripts_only")]
    pub files_only: bool,

    /// Only workflow and script files.
    #[arg(long)]
    pub scripts_only: bool,

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

impl PlanArgs {
    pub fn run(self) -> Result<ExitCode> {
        let schema = loader::load_at(&self.schema_dir, &self.schema, None)
            .with_context(|| format!("cannot load schema '{}'", self.schema))?;
        let templates = TemplateSet::load(&self.templates)
            .with_context(|| format!("cannot load templates from '{}'", self.templates.display()))?;
        let run_scope = scope(self.files_only, self.scripts_only);
        let targets = discover_targets(&self.org, &self.repos, &self.exclude)?;
        let state_dir = self.state_dir.unwrap_or_else(default_state_dir);
        let branch = BranchName::from(self.branch.as_str());

        let mut conflicted = 0usize;
        for target in &targets {
            let doc = overrides::merged_with_schema(&target.override_doc, &schema);
            let stored = baseline::load_at(&state_dir, &target.name)?;
            let plan = planner::plan(
                &templates,
                &self.org.join(target.name.to_string()),
                &doc,
                &schema.mirrors,
                &stored,
                target.name.clone(),
                branch.clone(),
                run_scope,
            )?;

            if !plan.enabled {
                println!("{} — sync disabled by override", target.name.to_string().bold());
                continue;
            }

            println!(
                "{} — {} writes, {} deletes, {} skips",
                target.name.to_string().bold(),
                plan.write_count(),
                plan.delete_count(),
                plan.skip_count(),
            );
            for op in &plan.job.operations {
                match op {
                    FileOperation::Write { path, .. } => {
                        println!("  {}  {}", "~".yellow(), path.display())
                    }
                    FileOperation::Delete { path } => {
                        println!("  {}  {}", "-".red(), path.display())
                    }
                    FileOperation::Skip { path, reason } => {
                        println!("  {}  {} ({reason})", "·".bright_black(), path.display())
                    }
                }
            }
            for diff in &plan.diffs {
                println!("{}", diff.unified_diff);
            }
            for conflict in &plan.conflicts {
                conflicted += 1;
                println!("  {}  {conflict}", "!".red().bold());
            }
        }

        if conflicted > 0 {
            println!(
                "{} mirrored document pair(s) conflict; resolve manually before syncing",
                conflicted
            );
            return Ok(ExitCode::from(1));
        }
        Ok(ExitCode::SUCCESS)
    }
}

pub(crate) fn scope(files_only: bool, scripts_only: bool) -> TemplateScope {
    if files_only {
        TemplateScope::FilesOnly
    } else if scripts_only {
        TemplateScope::ScriptsOnly
    } else {
        TemplateScope::All
    }
}
