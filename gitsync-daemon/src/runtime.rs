use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinError;

use gitsync_core::{Config, RunMode};
use gitsync_mirror::{CommandRunner, SyncCoordinator, SystemRunner};

use crate::error::{io_err, DaemonError};
use crate::schedule::CronSchedule;

/// Grace period for an in-flight git command after an interrupt.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Once mode finished its single pass.
    Completed,
    /// SIGINT or SIGTERM arrived during setup, a sync pass, or a sleep.
    Interrupted,
}

/// Initialise tracing and run to completion on a fresh multi-threaded runtime.
pub fn start_blocking(config: Config) -> Result<RunOutcome, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let outcome = runtime.block_on(run(config, Arc::new(SystemRunner)));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    outcome
}

/// Run until completion or until the process receives SIGINT/SIGTERM.
pub async fn run(config: Config, runner: Arc<dyn CommandRunner>) -> Result<RunOutcome, DaemonError> {
    run_until(config, runner, shutdown_signal()).await
}

/// Set up every mirror, then sync once or on the configured schedule until
/// `shutdown` resolves.
pub async fn run_until<F>(
    config: Config,
    runner: Arc<dyn CommandRunner>,
    shutdown: F,
) -> Result<RunOutcome, DaemonError>
where
    F: Future<Output = ()>,
{
    let schedule = match &config.settings.run_mode {
        RunMode::Once => None,
        RunMode::Cron { expression } => Some(CronSchedule::parse(expression)?),
    };
    log_config(&config);

    tokio::pin!(shutdown);

    let setup = tokio::task::spawn_blocking(move || SyncCoordinator::from_config(&config, runner));
    let mut coordinator = tokio::select! {
        result = setup => joined("setup", result)??,
        () = &mut shutdown => {
            tracing::info!("interrupted during setup");
            return Ok(RunOutcome::Interrupted);
        }
    };

    loop {
        let pass = tokio::task::spawn_blocking(move || {
            let report = coordinator.sync_all();
            (coordinator, report)
        });
        let (synced, report) = tokio::select! {
            result = pass => joined("sync", result)?,
            () = &mut shutdown => {
                tracing::info!("interrupted during sync pass");
                return Ok(RunOutcome::Interrupted);
            }
        };
        coordinator = synced;
        if !report.is_success() {
            let failed: Vec<&str> = report.failed_repos().map(|r| r.0.as_str()).collect();
            tracing::warn!(failed = ?failed, "some mirrors failed to sync");
        }

        let Some(schedule) = &schedule else {
            return Ok(RunOutcome::Completed);
        };
        let Some((delay, next)) = schedule.delay_until_next(&Local::now()) else {
            tracing::warn!(cron = schedule.expression(), "schedule has no upcoming run; stopping");
            return Ok(RunOutcome::Completed);
        };
        tracing::info!(next_run = %next, "sleeping {}s until next run", delay.as_secs());

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = &mut shutdown => {
                tracing::info!("interrupted while sleeping");
                return Ok(RunOutcome::Interrupted);
            }
        }
    }
}

/// Resolves on SIGINT or SIGTERM. Never resolves if no handler can be installed.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            tracing::warn!(error = %err, "cannot listen for SIGTERM");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        () = ctrl_c() => {}
        _ = term.recv() => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, shutting down"),
        Err(err) => {
            tracing::warn!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    }
}

fn log_config(config: &Config) {
    let settings = &config.settings;
    let cron = match &settings.run_mode {
        RunMode::Once => None,
        RunMode::Cron { expression } => Some(expression.as_str()),
    };
    tracing::info!(
        config = %config.path.display(),
        run_type = %settings.run_mode.run_type(),
        cron = ?cron,
        keyfile = %settings.keyfile.display(),
        cache_root_dir = %settings.cache_root_dir.display(),
        known_hosts = ?settings.known_hosts_file.as_deref().map(|p| p.display().to_string()),
        trust_all_host_keys = settings.trust_all_host_keys,
        repos = config.repos.len(),
        "loaded configuration",
    );
    for repo in &config.repos {
        let remotes: Vec<&str> = repo.remotes.iter().map(|r| r.name.0.as_str()).collect();
        tracing::debug!(repo = %repo.name, remotes = ?remotes, "configured repo");
    }
}

fn joined<T>(task: &'static str, result: Result<T, JoinError>) -> Result<T, DaemonError> {
    result.map_err(|source| DaemonError::Join { task, source })
}

/// Install the global subscriber: `RUST_LOG` filter, `info` by default.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
