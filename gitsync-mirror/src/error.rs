//! Error types for gitsync-mirror.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use gitsync_core::{ConfigError, RemoteName, RepoName};

use crate::mirror::MirrorState;

/// An external command that could not be run or did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit. Both captured streams are kept for diagnosis.
    #[error("`{command}` {}: {}", exit_label(.code), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl CommandError {
    /// Captured `(stdout, stderr)` of a command that ran and failed.
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            CommandError::Failed { stdout, stderr, .. } => Some((stdout, stderr)),
            CommandError::Spawn { .. } => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_owned(),
    }
}

/// Failure while establishing host-key trust.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("key scan for {host}:{port} failed: {source}")]
    Scan {
        host: String,
        port: u16,
        #[source]
        source: CommandError,
    },

    /// The scan exited cleanly but the host offered no keys.
    #[error("key scan for {host}:{port} returned no host keys")]
    NoKeys { host: String, port: u16 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single step of mirror setup or sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    TrustHostKeys,
    PrepareCacheDir,
    Clone,
    IntegrityCheck,
    RegisterRemote(RemoteName),
    Fetch,
    Push(RemoteName),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::TrustHostKeys => write!(f, "trusting host keys"),
            Step::PrepareCacheDir => write!(f, "preparing the cache directory"),
            Step::Clone => write!(f, "cloning the source remote"),
            Step::IntegrityCheck => write!(f, "checking repository integrity"),
            Step::RegisterRemote(name) => write!(f, "registering push remote '{name}'"),
            Step::Fetch => write!(f, "fetching the source remote"),
            Step::Push(name) => write!(f, "pushing to '{name}'"),
        }
    }
}

/// Cause of a failed step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that can arise from mirror setup and sync.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Invalid mirror definition; raised before anything touches disk or network.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Fatal for the run: an unset-up mirror is never scheduled.
    #[error("setup of '{repo}' failed while {step}: {source}")]
    Setup {
        repo: RepoName,
        step: Step,
        #[source]
        source: StepError,
    },

    /// Isolated per repo by the coordinator and retried next cycle.
    #[error("sync of '{repo}' failed while {step}: {source}")]
    Sync {
        repo: RepoName,
        step: Step,
        #[source]
        source: StepError,
    },

    #[error("cannot {operation} '{repo}' while it is {state}")]
    InvalidState {
        repo: RepoName,
        state: MirrorState,
        operation: &'static str,
    },
}

impl MirrorError {
    /// Captured `(stdout, stderr)` of the external command behind this error, if any.
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        let source = match self {
            MirrorError::Setup { source, .. } | MirrorError::Sync { source, .. } => source,
            MirrorError::Config(_) | MirrorError::InvalidState { .. } => return None,
        };
        match source {
            StepError::Command(err) => err.captured_output(),
            StepError::Trust(TrustError::Scan { source, .. }) => source.captured_output(),
            StepError::Trust(_) | StepError::Io { .. } => None,
        }
    }

    /// The step that failed, for setup and sync failures.
    pub fn step(&self) -> Option<&Step> {
        match self {
            MirrorError::Setup { step, .. } | MirrorError::Sync { step, .. } => Some(step),
            MirrorError::Config(_) | MirrorError::InvalidState { .. } => None,
        }
    }
}

/// Convenience constructor for [`StepError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StepError {
    StepError::Io {
        path: path.into(),
        source,
    }
}
