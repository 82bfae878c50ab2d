//! Git invocations with per-remote SSH identity.

use std::path::Path;
use std::sync::Arc;

use crate::command::{CommandOutput, CommandRunner, Invocation};
use crate::error::CommandError;
use crate::ssh::SshOptions;

/// Builds and runs `git` commands through a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct Git {
    runner: Arc<dyn CommandRunner>,
    ssh: SshOptions,
}

impl Git {
    pub fn new(runner: Arc<dyn CommandRunner>, ssh: SshOptions) -> Self {
        Self { runner, ssh }
    }

    pub fn ssh_options(&self) -> &SshOptions {
        &self.ssh
    }

    /// Same runner, different SSH behaviour.
    pub fn with_ssh_options(&self, ssh: SshOptions) -> Self {
        Self {
            runner: self.runner.clone(),
            ssh,
        }
    }

    /// The invocation for `git <args>`, without running it.
    ///
    /// `GIT_TERMINAL_PROMPT=0` is always set so a missing credential fails
    /// instead of blocking on a prompt.
    pub fn invocation<I, S>(&self, args: I, cwd: Option<&Path>, keyfile: Option<&Path>) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inv = Invocation::new("git")
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = cwd {
            inv = inv.current_dir(dir);
        }
        if let Some(keyfile) = keyfile {
            tracing::debug!(keyfile = %keyfile.display(), "using keyfile");
        }
        if let Some(ssh) = self.ssh.command(keyfile) {
            inv = inv.env("GIT_SSH_COMMAND", ssh);
        }
        inv
    }

    pub fn run<I, S>(
        &self,
        args: I,
        cwd: Option<&Path>,
        keyfile: Option<&Path>,
    ) -> Result<CommandOutput, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inv = self.invocation(args, cwd, keyfile);
        self.runner.run(&inv)
    }
}
