//! `steward check` — compliance scoring for a single repository.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use steward_health::{evaluate, report, RepoTree};
use steward_schema::{detect, loader};

use super::OVERRIDE_FILE;

/// Arguments for `steward check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the repository working copy.
    pub path: PathBuf,

    /// Directory containing schema documents.
    #[arg(long, default_value = "schemas")]
    pub schema_dir: PathBuf,

    /// Schema document name (file stem).
    #[arg(long, default_value = "standards")]
    pub schema: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<ExitCode> {
        let override_doc = loader::load_override(&self.path.join(OVERRIDE_FILE))
            .context("invalid override document")?;
        let repository_type = detect::effective_repository_type(&self.path, &override_doc);
        let schema = loader::load_at(&self.schema_dir, &self.schema, Some(&override_doc))
            .with_context(|| format!("cannot load schema '{}'", self.schema))?;

        let tree = RepoTree::snapshot(&self.path)
            .with_context(|| format!("cannot read repository at '{}'", self.path.display()))?;
        let health = evaluate(&tree, &schema, repository_type)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&health).context("failed to serialize report")?
            );
        } else {
            print!("{}", report::render_text(&health));
            let verdict = if health.is_failing(&schema) {
                "FAILING".red().bold()
            } else {
                "PASSING".green().bold()
            };
            println!("verdict: {verdict}");
        }

        if health.is_failing(&schema) {
            Ok(ExitCode::from(1))
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }
}
