//! [`RepositoryMirror`]: one repo's setup and sync lifecycle.
//!
//! ```text
//! Uninitialized ──setup()──▶ Setup ──ok──▶ Ready ──sync()──▶ Syncing ──▶ Ready
//!                              └──err──▶ Failed
//! ```
//!
//! ## Setup, strictly ordered
//!
//! 1. Trust host keys of every SSH remote (skipped with `trust_all_host_keys`).
//! 2. Remove and recreate `<cache_root>/<name>`.
//! 3. `git clone --mirror --origin <source> <url> <cache>`.
//! 4. `git fsck`.
//! 5. `git remote add --mirror=push <name> <url>` for each secondary remote.
//!
//! ## Sync, strictly ordered
//!
//! 1. `git fetch --prune <source>`.
//! 2. `git fsck`: a corrupted fetch is never pushed.
//! 3. `git push --mirror <name>` for each secondary remote.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitsync_core::{paths, ConfigError, GlobalSettings, RemoteDescriptor, RepoName};

use crate::command::CommandRunner;
use crate::error::{io_err, MirrorError, Step, StepError};
use crate::git::Git;
use crate::ssh::SshOptions;
use crate::trust::HostKeyTrustStore;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Uninitialized,
    Setup,
    Ready,
    Syncing,
    /// Setup failed; the mirror must not be synced.
    Failed,
}

impl fmt::Display for MirrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorState::Uninitialized => write!(f, "uninitialized"),
            MirrorState::Setup => write!(f, "setting up"),
            MirrorState::Ready => write!(f, "ready"),
            MirrorState::Syncing => write!(f, "syncing"),
            MirrorState::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// Settings and collaborators shared by every mirror of a coordinator.
#[derive(Debug, Clone)]
pub struct MirrorContext {
    cache_root_dir: PathBuf,
    root_keyfile: Option<PathBuf>,
    trust_all_host_keys: bool,
    trust_store: Arc<HostKeyTrustStore>,
    git: Git,
}

impl MirrorContext {
    /// A context with a custom trust-store path and no root keyfile.
    pub fn new(
        cache_root_dir: impl Into<PathBuf>,
        trust_store_path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let trust_store_path = trust_store_path.into();
        let ssh = SshOptions {
            known_hosts_file: Some(trust_store_path.clone()),
            trust_all_host_keys: false,
        };
        Self {
            cache_root_dir: cache_root_dir.into(),
            root_keyfile: None,
            trust_all_host_keys: false,
            trust_store: Arc::new(HostKeyTrustStore::new(trust_store_path, runner.clone())),
            git: Git::new(runner, ssh),
        }
    }

    /// Build the context for resolved global settings.
    ///
    /// Fails with `ConfigError::KeyfileNotFound` if the root keyfile is missing.
    pub fn from_settings(
        settings: &GlobalSettings,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ConfigError> {
        if !settings.keyfile.is_file() {
            return Err(ConfigError::KeyfileNotFound {
                path: settings.keyfile.clone(),
            });
        }
        let trust_store_path = match &settings.known_hosts_file {
            Some(path) => path.clone(),
            None => paths::default_known_hosts()?,
        };
        let ssh = SshOptions {
            known_hosts_file: settings.known_hosts_file.clone(),
            trust_all_host_keys: settings.trust_all_host_keys,
        };
        Ok(Self {
            cache_root_dir: settings.cache_root_dir.clone(),
            root_keyfile: Some(settings.keyfile.clone()),
            trust_all_host_keys: settings.trust_all_host_keys,
            trust_store: Arc::new(HostKeyTrustStore::new(trust_store_path, runner.clone())),
            git: Git::new(runner, ssh),
        })
    }

    pub fn with_root_keyfile(mut self, keyfile: Option<PathBuf>) -> Self {
        self.root_keyfile = keyfile;
        self
    }

    pub fn with_trust_all_host_keys(mut self, trust_all: bool) -> Self {
        self.trust_all_host_keys = trust_all;
        let ssh = SshOptions {
            trust_all_host_keys: trust_all,
            ..self.git.ssh_options().clone()
        };
        self.git = self.git.with_ssh_options(ssh);
        self
    }

    pub fn cache_root_dir(&self) -> &Path {
        &self.cache_root_dir
    }

    pub fn root_keyfile(&self) -> Option<&Path> {
        self.root_keyfile.as_deref()
    }

    pub fn trust_store(&self) -> &HostKeyTrustStore {
        &self.trust_store
    }
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

/// One mirrored repository: a bare clone of the source remote plus its push targets.
#[derive(Debug)]
pub struct RepositoryMirror {
    name: RepoName,
    cache_path: PathBuf,
    remotes: Vec<RemoteDescriptor>,
    keyfile: Option<PathBuf>,
    primary: usize,
    state: MirrorState,
    ctx: MirrorContext,
}

impl RepositoryMirror {
    /// Validate and set up a mirror. The returned mirror is `Ready`.
    pub fn new(
        name: impl Into<RepoName>,
        remotes: Vec<RemoteDescriptor>,
        keyfile: Option<PathBuf>,
        ctx: &MirrorContext,
    ) -> Result<Self, MirrorError> {
        let mut mirror = Self::configure(name, remotes, keyfile, ctx)?;
        mirror.setup()?;
        Ok(mirror)
    }

    /// Validate a mirror definition without touching disk or network.
    ///
    /// Checks the repo name, remote-name uniqueness, the mirror keyfile, and
    /// that exactly one remote is the source.
    pub fn configure(
        name: impl Into<RepoName>,
        remotes: Vec<RemoteDescriptor>,
        keyfile: Option<PathBuf>,
        ctx: &MirrorContext,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if !name.is_valid_path_component() {
            return Err(ConfigError::InvalidRepoName { name: name.0 });
        }

        let mut seen = HashSet::new();
        if let Some(dup) = remotes.iter().find(|r| !seen.insert(r.name().clone())) {
            return Err(ConfigError::InvalidValue {
                field: "remotes",
                value: dup.name().0.clone(),
                expected: "remote names unique within a repo",
            });
        }

        if let Some(path) = &keyfile {
            if !path.is_file() {
                return Err(ConfigError::KeyfileNotFound { path: path.clone() });
            }
        }

        let sources: Vec<usize> = remotes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_source())
            .map(|(idx, _)| idx)
            .collect();
        let [primary] = sources.as_slice() else {
            return Err(ConfigError::SourceRemoteCount {
                repo: name.0,
                count: sources.len(),
            });
        };

        Ok(Self {
            cache_path: ctx.cache_root_dir.join(&name.0),
            name,
            remotes,
            keyfile,
            primary: *primary,
            state: MirrorState::Uninitialized,
            ctx: ctx.clone(),
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn name(&self) -> &RepoName {
        &self.name
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn state(&self) -> MirrorState {
        self.state
    }

    pub fn remotes(&self) -> &[RemoteDescriptor] {
        &self.remotes
    }

    /// Mirror-level keyfile override.
    pub fn keyfile(&self) -> Option<&Path> {
        self.keyfile.as_deref()
    }

    /// The single source remote.
    pub fn primary_remote(&self) -> &RemoteDescriptor {
        &self.remotes[self.primary]
    }

    /// Every remote except the source, in declaration order.
    pub fn secondary_remotes(&self) -> impl Iterator<Item = &RemoteDescriptor> + '_ {
        self.remotes.iter().filter(|r| !r.is_source())
    }

    /// Identity used for operations against `remote`:
    /// remote override > mirror override > root keyfile > none.
    pub fn resolve_keyfile<'a>(&'a self, remote: &'a RemoteDescriptor) -> Option<&'a Path> {
        remote
            .keyfile()
            .or(self.keyfile.as_deref())
            .or(self.ctx.root_keyfile.as_deref())
    }

    // -- lifecycle ----------------------------------------------------------

    /// Run the one-time setup. Allowed from `Uninitialized` or after a failed setup.
    pub fn setup(&mut self) -> Result<(), MirrorError> {
        if !matches!(self.state, MirrorState::Uninitialized | MirrorState::Failed) {
            return Err(self.invalid_state("set up"));
        }

        tracing::info!(repo = %self.name, cache = %self.cache_path.display(), "setting up mirror");
        self.state = MirrorState::Setup;
        match self.run_setup() {
            Ok(()) => {
                self.state = MirrorState::Ready;
                tracing::info!(repo = %self.name, "mirror ready");
                Ok(())
            }
            Err((step, source)) => {
                self.state = MirrorState::Failed;
                Err(MirrorError::Setup {
                    repo: self.name.clone(),
                    step,
                    source,
                })
            }
        }
    }

    /// Fetch from the source, verify, and push to every secondary remote.
    ///
    /// A failed sync leaves the mirror `Ready` so the next cycle retries it.
    pub fn sync(&mut self) -> Result<(), MirrorError> {
        if self.state != MirrorState::Ready {
            return Err(self.invalid_state("sync"));
        }

        tracing::info!(repo = %self.name, "syncing mirror");
        self.state = MirrorState::Syncing;
        let result = self.run_sync();
        self.state = MirrorState::Ready;

        result.map_err(|(step, source)| MirrorError::Sync {
            repo: self.name.clone(),
            step,
            source,
        })
    }

    fn run_setup(&self) -> Result<(), (Step, StepError)> {
        if self.ctx.trust_all_host_keys {
            tracing::debug!(repo = %self.name, "trusting all host keys; skipping key scan");
        } else {
            self.ctx
                .trust_store
                .trust_all(&self.remotes)
                .map_err(|e| (Step::TrustHostKeys, e.into()))?;
        }

        self.recreate_cache_dir()
            .map_err(|e| (Step::PrepareCacheDir, e))?;

        let primary = self.primary_remote();
        let cache = self.cache_path.to_string_lossy().into_owned();
        self.ctx
            .git
            .run(
                [
                    "clone",
                    "--mirror",
                    "--origin",
                    primary.name().0.as_str(),
                    primary.url().as_str(),
                    cache.as_str(),
                ],
                None,
                self.resolve_keyfile(primary),
            )
            .map_err(|e| (Step::Clone, e.into()))?;

        self.integrity_check()?;

        for remote in self.secondary_remotes() {
            let mut args = vec!["remote", "add"];
            // Remotes with excluded refs are pushed with explicit refspecs,
            // which git refuses for remotes configured as mirrors.
            if remote.excluded_refs().is_empty() {
                args.push("--mirror=push");
            }
            args.extend([remote.name().0.as_str(), remote.url().as_str()]);
            self.ctx
                .git
                .run(args, Some(&self.cache_path), None)
                .map_err(|e| (Step::RegisterRemote(remote.name().clone()), e.into()))?;
        }
        Ok(())
    }

    fn run_sync(&self) -> Result<(), (Step, StepError)> {
        let primary = self.primary_remote();
        self.ctx
            .git
            .run(
                ["fetch", "--prune", primary.name().0.as_str()],
                Some(&self.cache_path),
                self.resolve_keyfile(primary),
            )
            .map_err(|e| (Step::Fetch, e.into()))?;

        self.integrity_check()?;

        for remote in self.secondary_remotes() {
            tracing::info!(repo = %self.name, remote = %remote.name(), "pushing");
            self.ctx
                .git
                .run(
                    push_args(remote),
                    Some(&self.cache_path),
                    self.resolve_keyfile(remote),
                )
                .map_err(|e| (Step::Push(remote.name().clone()), e.into()))?;
        }
        Ok(())
    }

    fn integrity_check(&self) -> Result<(), (Step, StepError)> {
        self.ctx
            .git
            .run(["fsck"], Some(&self.cache_path), None)
            .map(|_| ())
            .map_err(|e| (Step::IntegrityCheck, e.into()))
    }

    fn recreate_cache_dir(&self) -> Result<(), StepError> {
        if self.cache_path.exists() {
            tracing::debug!(path = %self.cache_path.display(), "removing stale cache directory");
            std::fs::remove_dir_all(&self.cache_path).map_err(|e| io_err(&self.cache_path, e))?;
        }
        std::fs::create_dir_all(&self.cache_path).map_err(|e| io_err(&self.cache_path, e))
    }

    fn invalid_state(&self, operation: &'static str) -> MirrorError {
        MirrorError::InvalidState {
            repo: self.name.clone(),
            state: self.state,
            operation,
        }
    }
}

/// `git push` arguments for a secondary remote.
///
/// Without exclusions this is a plain mirror push. With exclusions it is the
/// equivalent forced, pruning push of every ref, minus negative refspecs.
pub fn push_args(remote: &RemoteDescriptor) -> Vec<String> {
    let name = remote.name().0.clone();
    if remote.excluded_refs().is_empty() {
        return vec!["push".into(), "--mirror".into(), name];
    }
    let mut args = vec![
        "push".into(),
        "--force".into(),
        "--prune".into(),
        name,
        "+refs/*:refs/*".into(),
    ];
    args.extend(remote.excluded_refs().iter().map(|pattern| format!("^{pattern}")));
    args
}
