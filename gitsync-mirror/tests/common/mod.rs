//! Scripted [`CommandRunner`] shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use gitsync_core::RemoteDescriptor;
use gitsync_mirror::{CommandError, CommandOutput, CommandRunner, Invocation, MirrorContext};

#[derive(Debug)]
struct Failure {
    needle: String,
    remaining: Option<usize>,
}

/// Records every invocation; fails the ones matching a scripted needle.
///
/// `ssh-keyscan` answers with two deterministic key lines per host.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<Invocation>>,
    failures: Mutex<Vec<Failure>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every invocation whose command line contains `needle` fails.
    pub fn fail_when(&self, needle: &str) {
        self.failures.lock().unwrap().push(Failure {
            needle: needle.to_owned(),
            remaining: None,
        });
    }

    /// Only the next invocation containing `needle` fails.
    pub fn fail_once_when(&self, needle: &str) {
        self.failures.lock().unwrap().push(Failure {
            needle: needle.to_owned(),
            remaining: Some(1),
        });
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::display).collect()
    }

    /// Command lines that start with `prefix`.
    pub fn commands_starting_with(&self, prefix: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// The last invocation whose command line contains `needle`.
    pub fn last_call_containing(&self, needle: &str) -> Option<Invocation> {
        self.calls()
            .into_iter()
            .rev()
            .find(|inv| inv.display().contains(needle))
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn scripted_failure(&self, line: &str) -> Option<String> {
        let mut failures = self.failures.lock().unwrap();
        let idx = failures.iter().position(|f| line.contains(&f.needle))?;
        let needle = failures[idx].needle.clone();
        if let Some(remaining) = failures[idx].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                failures.remove(idx);
            }
        }
        Some(needle)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let line = invocation.display();

        if let Some(needle) = self.scripted_failure(&line) {
            return Err(CommandError::Failed {
                command: line,
                code: Some(1),
                stdout: "scripted stdout".to_owned(),
                stderr: format!("scripted failure for '{needle}'"),
            });
        }

        if invocation.program == "ssh-keyscan" {
            let host = invocation.args.last().cloned().unwrap_or_default();
            let port = invocation.args.get(1).cloned().unwrap_or_default();
            let label = if port == "22" {
                host
            } else {
                format!("[{host}]:{port}")
            };
            return Ok(CommandOutput {
                stdout: format!("{label} ssh-ed25519 AAAAC3{label}\n{label} ssh-rsa AAAAB3{label}\n"),
                stderr: format!("# {label} SSH-2.0-OpenSSH\n"),
            });
        }

        Ok(CommandOutput::default())
    }
}

/// Context over a scripted runner rooted in `dir`.
pub fn context(dir: &Path, runner: &Arc<ScriptedRunner>) -> MirrorContext {
    let runner: Arc<dyn CommandRunner> = runner.clone();
    MirrorContext::new(dir.join("cache"), dir.join("ssh").join("known_hosts"), runner)
}

pub fn remote(name: &str, url: &str, source: bool) -> RemoteDescriptor {
    RemoteDescriptor::new(name, url, source, None, vec![]).expect("remote")
}

pub fn keyed_remote(name: &str, url: &str, source: bool, keyfile: &Path) -> RemoteDescriptor {
    RemoteDescriptor::new(name, url, source, Some(keyfile.to_path_buf()), vec![]).expect("remote")
}

/// Write an empty file standing in for a private key.
pub fn make_key(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "not really a key").expect("write key");
    path
}
