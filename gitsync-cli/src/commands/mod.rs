pub mod check;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use gitsync_core::config::{self, Config, Overrides};
use gitsync_core::paths::DEFAULT_CONFIG_FILE;
use gitsync_core::RunType;

/// Where the config lives, plus the settings flags may override.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the YAML or JSON config file.
    #[arg(short, long, env = "GITSYNC_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Run a single pass (`once`) or keep syncing on the schedule (`cron`).
    #[arg(long, env = "GITSYNC_RUN_TYPE")]
    pub run_type: Option<RunType>,

    /// Directory holding one bare mirror clone per repo.
    #[arg(long, env = "GITSYNC_CACHE_ROOT_DIR")]
    pub cache_root_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Config> {
        let overrides = Overrides {
            run_type: self.run_type,
            cache_root_dir: self.cache_root_dir.clone(),
        };
        config::load(&self.config, &overrides)
            .with_context(|| format!("invalid configuration in {}", self.config.display()))
    }
}
