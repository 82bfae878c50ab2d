//! `gitsync run`: set up all mirrors and keep them in sync.

use anyhow::{Context, Result};
use clap::Args;

use gitsync_daemon::RunOutcome;

use super::ConfigArgs;

/// Arguments for `gitsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        gitsync_daemon::init_tracing();
        let config = self.config.load()?;

        match gitsync_daemon::start_blocking(config).context("gitsync run failed")? {
            RunOutcome::Completed => tracing::info!("all sync passes finished"),
            RunOutcome::Interrupted => tracing::info!("interrupted; exiting"),
        }
        Ok(())
    }
}
