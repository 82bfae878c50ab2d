//! Host-key trust store.
//!
//! For every SSH remote the host's public keys are fetched with
//! `ssh-keyscan -p <port> <host>` and merged into a known-hosts file:
//!
//! 1. Scan every SSH remote. Any failure aborts before the file is touched.
//! 2. Append the scanned lines to the existing contents.
//! 3. Rewrite the file as the deduplicated line set (first occurrence wins)
//!    via a `.tmp` sibling, `chmod 0600`, `rename`.
//!
//! Repeated runs for the same hosts leave the file unchanged.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitsync_core::{RemoteDescriptor, RemoteUrl};

use crate::command::{CommandRunner, Invocation};
use crate::error::TrustError;

/// A known-hosts file plus the means to populate it.
#[derive(Debug, Clone)]
pub struct HostKeyTrustStore {
    path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl HostKeyTrustStore {
    pub fn new(path: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            path: path.into(),
            runner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Trust the host behind a single remote. Returns the number of new lines.
    pub fn trust(&self, remote: &RemoteDescriptor) -> Result<usize, TrustError> {
        self.trust_all(std::iter::once(remote))
    }

    /// Trust the hosts behind every SSH remote in `remotes`, all or nothing.
    ///
    /// Returns the number of lines the file gained.
    pub fn trust_all<'a, I>(&self, remotes: I) -> Result<usize, TrustError>
    where
        I: IntoIterator<Item = &'a RemoteDescriptor>,
    {
        let mut scanned = Vec::new();
        for remote in remotes {
            let Some((host, port)) = scan_target(remote.url()) else {
                tracing::debug!(remote = %remote.name(), url = %remote.url().redacted(), "not an ssh remote; no host key needed");
                continue;
            };
            tracing::info!(remote = %remote.name(), %host, port, "getting host keys");
            scanned.extend(self.scan(&host, port)?);
        }

        if scanned.is_empty() {
            return Ok(0);
        }
        tracing::debug!(lines = scanned.len(), "scanned host keys");
        self.merge(&scanned)
    }

    fn scan(&self, host: &str, port: u16) -> Result<Vec<String>, TrustError> {
        let inv = Invocation::new("ssh-keyscan")
            .arg("-p")
            .arg(port.to_string())
            .arg(host);
        let output = self.runner.run(&inv).map_err(|source| TrustError::Scan {
            host: host.to_owned(),
            port,
            source,
        })?;

        let lines: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect();
        if lines.is_empty() {
            return Err(TrustError::NoKeys {
                host: host.to_owned(),
                port,
            });
        }
        Ok(lines)
    }

    fn merge(&self, scanned: &[String]) -> Result<usize, TrustError> {
        ensure_parent_dir(&self.path)?;

        let existing = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(&self.path, e)),
        };

        let existing_lines: Vec<&str> = existing.lines().collect();
        let merged = dedup_lines(
            existing_lines
                .iter()
                .copied()
                .chain(scanned.iter().map(String::as_str)),
        );
        let before = dedup_lines(existing_lines.iter().copied()).len();
        let added = merged.len().saturating_sub(before);

        let mut contents = merged.join("\n");
        contents.push('\n');

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }

        tracing::info!(path = %self.path.display(), added, "updated trusted host keys");
        Ok(added)
    }
}

/// `(host, port)` to scan for an SSH remote, `None` for other transports.
pub fn scan_target(url: &RemoteUrl) -> Option<(String, u16)> {
    url.is_ssh()
        .then(|| (url.host().to_owned(), url.ssh_port()))
}

/// Unique, non-empty lines in first-seen order.
fn dedup_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    lines
        .filter(|line| !line.trim().is_empty())
        .filter(|line| seen.insert(*line))
        .collect()
}

fn io_err(path: &Path, source: std::io::Error) -> TrustError {
    TrustError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), TrustError> {
    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    set_dir_permissions(dir)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), TrustError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), TrustError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), TrustError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), TrustError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
