//! `GIT_SSH_COMMAND` construction.

use std::path::{Path, PathBuf};

/// SSH behaviour shared by every git invocation of a coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshOptions {
    /// Non-default trust store; `None` leaves ssh on `~/.ssh/known_hosts`.
    pub known_hosts_file: Option<PathBuf>,
    /// Skip host-key verification entirely instead of scanning keys up front.
    pub trust_all_host_keys: bool,
}

impl SshOptions {
    /// The ssh command line git should use, or `None` when plain `ssh` will do.
    ///
    /// A resolved keyfile is forced with `IdentitiesOnly=yes` so that no other
    /// agent or default identity is offered first.
    pub fn command(&self, keyfile: Option<&Path>) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(keyfile) = keyfile {
            parts.push("-i".into());
            parts.push(shell_quote(&keyfile.to_string_lossy()));
            parts.push("-o".into());
            parts.push("IdentitiesOnly=yes".into());
        }
        if self.trust_all_host_keys {
            parts.push("-o".into());
            parts.push("StrictHostKeyChecking=no".into());
        } else if let Some(known_hosts) = &self.known_hosts_file {
            parts.push("-o".into());
            parts.push(shell_quote(&format!(
                "UserKnownHostsFile={}",
                known_hosts.to_string_lossy()
            )));
        }

        if parts.is_empty() {
            return None;
        }
        Some(format!("ssh {}", parts.join(" ")))
    }
}

/// Quote `value` for the shell git uses to run `GIT_SSH_COMMAND`.
fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '=' | ':' | '@' | '+' | '~' | ','));
    if safe {
        value.to_owned()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
