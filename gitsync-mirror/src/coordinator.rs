//! [`SyncCoordinator`]: builds every mirror and drives batch sync.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gitsync_core::{Config, RemoteDescriptor, RepoName, RepoTable};

use crate::command::CommandRunner;
use crate::error::MirrorError;
use crate::mirror::{MirrorContext, RepositoryMirror};

/// Owns the mirrors of one process run.
#[derive(Debug)]
pub struct SyncCoordinator {
    mirrors: Vec<RepositoryMirror>,
}

impl SyncCoordinator {
    /// Validate every repo, then set each one up in declaration order.
    ///
    /// All configuration errors surface before the first clone. Any setup
    /// failure aborts construction; no partially ready coordinator is returned.
    pub fn new(repos: &RepoTable, ctx: &MirrorContext) -> Result<Self, MirrorError> {
        let mut mirrors = plan(repos, ctx)?;
        for mirror in &mut mirrors {
            mirror.setup()?;
        }
        tracing::info!(mirrors = mirrors.len(), "all mirrors ready");
        Ok(Self { mirrors })
    }

    /// Build the context from resolved settings and construct the coordinator.
    pub fn from_config(config: &Config, runner: Arc<dyn CommandRunner>) -> Result<Self, MirrorError> {
        let ctx = MirrorContext::from_settings(&config.settings, runner)?;
        Self::new(&config.repos, &ctx)
    }

    pub fn mirrors(&self) -> &[RepositoryMirror] {
        &self.mirrors
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Sync every mirror in declaration order.
    ///
    /// A failing mirror is logged with its command's captured output and
    /// recorded in the report; the remaining mirrors still sync.
    pub fn sync_all(&mut self) -> SyncReport {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(self.mirrors.len());

        for mirror in &mut self.mirrors {
            let mirror_started = Instant::now();
            let result = mirror.sync();
            let duration = mirror_started.elapsed();

            match &result {
                Ok(()) => {
                    tracing::info!(
                        repo = %mirror.name(),
                        duration_ms = duration.as_millis(),
                        "sync completed",
                    );
                }
                Err(err) => {
                    let (stdout, stderr) = err.captured_output().unwrap_or_default();
                    tracing::error!(
                        repo = %mirror.name(),
                        error = %err,
                        stdout = stdout.trim(),
                        stderr = stderr.trim(),
                        "sync failed; will retry next cycle",
                    );
                }
            }

            outcomes.push(RepoOutcome {
                repo: mirror.name().clone(),
                duration,
                result,
            });
        }

        let report = SyncReport {
            outcomes,
            duration: started.elapsed(),
        };
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            duration_ms = report.duration.as_millis(),
            "sync pass finished",
        );
        report
    }
}

/// Validate all repos into `Uninitialized` mirrors without touching disk or network.
pub fn plan(repos: &RepoTable, ctx: &MirrorContext) -> Result<Vec<RepositoryMirror>, MirrorError> {
    let mut mirrors = Vec::with_capacity(repos.len());
    for repo in repos {
        let remotes = repo
            .remotes
            .iter()
            .map(RemoteDescriptor::from_definition)
            .collect::<Result<Vec<_>, _>>()?;
        mirrors.push(RepositoryMirror::configure(
            repo.name.clone(),
            remotes,
            repo.keyfile.clone(),
            ctx,
        )?);
    }
    Ok(mirrors)
}

/// Result of one mirror in a sync pass.
#[derive(Debug)]
pub struct RepoOutcome {
    pub repo: RepoName,
    pub duration: Duration,
    pub result: Result<(), MirrorError>,
}

/// Result of a whole [`SyncCoordinator::sync_all`] pass.
#[derive(Debug)]
pub struct SyncReport {
    pub outcomes: Vec<RepoOutcome>,
    pub duration: Duration,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Repos whose sync failed this pass.
    pub fn failed_repos(&self) -> impl Iterator<Item = &RepoName> + '_ {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| &o.repo)
    }
}
