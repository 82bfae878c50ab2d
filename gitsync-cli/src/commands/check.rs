//! `gitsync check`: validate the config and show what would be mirrored.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;

use gitsync_core::{RemoteDescriptor, RunMode};
use gitsync_daemon::CronSchedule;
use gitsync_mirror::{plan, MirrorContext, RepositoryMirror, SystemRunner};

use super::ConfigArgs;

/// Arguments for `gitsync check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let settings = &config.settings;

        let schedule = match &settings.run_mode {
            RunMode::Once => None,
            RunMode::Cron { expression } => Some(
                CronSchedule::parse(expression).context("invalid cron_interval")?,
            ),
        };

        // Planning never runs a command; the runner only satisfies the context.
        let ctx = MirrorContext::from_settings(settings, Arc::new(SystemRunner))
            .context("invalid global settings")?;
        let mirrors = plan(&config.repos, &ctx).context("invalid repo definition")?;

        println!(
            "{} {}",
            "✓".green().bold(),
            config.path.display().to_string().bold()
        );
        match &schedule {
            None => println!("  run type: once"),
            Some(schedule) => {
                let next = schedule
                    .next_fire(&Local::now())
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S %Z").to_string())
                    .unwrap_or_else(|| "never".to_owned());
                println!(
                    "  run type: cron '{}' (next run {next})",
                    schedule.expression()
                );
            }
        }
        println!("  cache:    {}", settings.cache_root_dir.display());
        println!("  trust:    {}", trust_label(&ctx, settings.trust_all_host_keys));

        for mirror in &mirrors {
            print_mirror(mirror);
        }
        Ok(())
    }
}

fn trust_label(ctx: &MirrorContext, trust_all: bool) -> String {
    if trust_all {
        "all host keys accepted (no verification)".yellow().to_string()
    } else {
        ctx.trust_store().path().display().to_string()
    }
}

fn print_mirror(mirror: &RepositoryMirror) {
    println!();
    println!(
        "{}  {}",
        mirror.name().to_string().bold(),
        mirror.cache_path().display().to_string().bright_black()
    );
    let primary = mirror.primary_remote();
    print_remote(mirror, primary, "←".cyan().to_string());
    for remote in mirror.secondary_remotes() {
        print_remote(mirror, remote, "→".green().to_string());
    }
}

fn print_remote(mirror: &RepositoryMirror, remote: &RemoteDescriptor, arrow: String) {
    let url = remote.url();
    let transport = match url.scheme() {
        None => "ssh",
        Some(scheme) => scheme,
    };
    let key = mirror
        .resolve_keyfile(remote)
        .map(|k| format!(", key {}", k.display()))
        .unwrap_or_default();
    let excluded = if remote.excluded_refs().is_empty() {
        String::new()
    } else {
        format!(", excluding {}", remote.excluded_refs().join(" "))
    };
    println!(
        "  {arrow} {:<10} {}  {}",
        remote.name().to_string(),
        url.redacted(),
        format!("[{transport}{key}{excluded}]").bright_black()
    );
}
