//! Steward — repository compliance and synchronization CLI.
//!
//! # Usage
//!
//! ```text
//! steward check <path> [--schema-dir DIR] [--schema NAME] [--json]
//! steward plan --org <dir> [--repos a,b] [--exclude c] [--files-only|--scripts-only]
//! steward sync --org <dir> [--repos a,b] [--branch ...] [--dry-run] [--yes]
//!              [--workers N] [--resume KEY] [--skip-failed]
//! ```
//!
//! Exit codes: 0 on success, 1 when any repository failed compliance or
//! sync, 2 on usage and configuration errors.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{check::CheckArgs, plan::PlanArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "steward",
    version,
    about = "Schema-driven compliance scoring and bulk standards sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score one repository against a compliance schema.
    Check(CheckArgs),

    /// Show what a sync would change, without mutating anything.
    Plan(PlanArgs),

    /// Synchronize standards across an organization's repositories.
    Sync(SyncArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Sync(args) => args.run().await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
