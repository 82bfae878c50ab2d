//! gitsync: mirror git repositories from a source remote to secondary remotes.
//!
//! # Usage
//!
//! ```text
//! gitsync run   [--config <file>] [--run-type once|cron] [--cache-root-dir <dir>]
//! gitsync check [--config <file>]
//! ```
//!
//! Every flag can also be set through its `GITSYNC_*` environment variable.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gitsync",
    version,
    about = "Keep push-mirrors of git repositories in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set up every mirror, then sync once or on the cron schedule.
    Run(RunArgs),

    /// Validate the configuration and list the mirrors it defines.
    Check(CheckArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
