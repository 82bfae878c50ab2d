//! Git remote URL parser.
//!
//! Two forms are recognised:
//!
//! ```text
//! [scheme://][user@]host[:port][/path]     e.g. ssh://git@host:2222/org/app.git
//! [user@]host:path                         e.g. git@host:org/app.git
//! ```
//!
//! Anything else is rejected. An authority that still holds a `:` after the
//! host/port split is ambiguous and rejected rather than guessed.

use std::fmt;
use std::str::FromStr;

use crate::error::UrlError;

/// Port used for SSH transports when the URL does not carry a usable one.
pub const DEFAULT_SSH_PORT: u16 = 22;

const SSH_SCHEMES: &[&str] = &["ssh", "git+ssh", "ssh+git"];

/// A parsed git remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    raw: String,
    scheme: Option<String>,
    user: Option<String>,
    host: String,
    port: Option<u16>,
    path: String,
}

impl RemoteUrl {
    /// Parse `raw` into its components.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(unrecognized(raw));
        }
        match trimmed.split_once("://") {
            Some((scheme, rest)) => parse_uri(trimmed, scheme, rest),
            None => parse_scp_like(trimmed),
        }
    }

    /// The original string, suitable for handing to git.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lower-cased scheme, `None` for scp-like addresses.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The explicit port, if one was given and fits in a TCP port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether connecting to this remote goes through SSH and so needs host-key trust.
    pub fn is_ssh(&self) -> bool {
        match &self.scheme {
            None => true,
            Some(scheme) => SSH_SCHEMES.contains(&scheme.as_str()),
        }
    }

    /// Port to use for an SSH connection to this host.
    pub fn ssh_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// The URL with any HTTP(S) userinfo replaced, for logs and error messages.
    pub fn redacted(&self) -> String {
        let is_http = matches!(self.scheme.as_deref(), Some("http" | "https"));
        match (&self.user, is_http) {
            (Some(user), true) => self.raw.replacen(&format!("{user}@"), "[REDACTED]@", 1),
            _ => self.raw.clone(),
        }
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

impl FromStr for RemoteUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn unrecognized(raw: &str) -> UrlError {
    UrlError::Unrecognized {
        url: raw.to_owned(),
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn parse_uri(raw: &str, scheme: &str, rest: &str) -> Result<RemoteUrl, UrlError> {
    if !is_valid_scheme(scheme) {
        return Err(unrecognized(raw));
    }
    let scheme = scheme.to_ascii_lowercase();

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let (user, host_port) = match authority.rsplit_once('@') {
        Some((user, host_port)) if !user.is_empty() => (Some(user.to_owned()), host_port),
        Some(_) => return Err(unrecognized(raw)),
        None => (None, authority),
    };
    let (host, port) = split_host_port(raw, authority, host_port)?;

    if host.is_empty() && scheme != "file" {
        return Err(UrlError::MissingHost {
            url: raw.to_owned(),
        });
    }
    reject_option_like(raw, &host)?;

    Ok(RemoteUrl {
        raw: raw.to_owned(),
        scheme: Some(scheme),
        user,
        host,
        port,
        path: path.to_owned(),
    })
}

fn parse_scp_like(raw: &str) -> Result<RemoteUrl, UrlError> {
    // `host:path` only counts as scp-like when the colon precedes any slash;
    // otherwise it is a local path, which has no host to trust.
    let Some(colon) = find_scp_colon(raw) else {
        return Err(unrecognized(raw));
    };
    let (user_host, path) = (&raw[..colon], &raw[colon + 1..]);
    if user_host.contains('/') || path.is_empty() {
        return Err(unrecognized(raw));
    }

    let (user, host) = match user_host.rsplit_once('@') {
        Some((user, host)) if !user.is_empty() => (Some(user.to_owned()), host),
        Some(_) => return Err(unrecognized(raw)),
        None => (None, user_host),
    };
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(UrlError::MissingHost {
            url: raw.to_owned(),
        });
    }
    reject_option_like(raw, host)?;
    if host.contains(':') && !user_host.contains('[') {
        return Err(UrlError::AmbiguousAuthority {
            url: raw.to_owned(),
            authority: user_host.to_owned(),
        });
    }

    Ok(RemoteUrl {
        raw: raw.to_owned(),
        scheme: None,
        user,
        host: host.to_owned(),
        port: None,
        path: path.to_owned(),
    })
}

fn reject_option_like(raw: &str, host: &str) -> Result<(), UrlError> {
    if host.starts_with('-') {
        return Err(UrlError::OptionLikeHost {
            url: raw.to_owned(),
            host: host.to_owned(),
        });
    }
    Ok(())
}

/// Index of the colon separating host from path, skipping a bracketed host.
fn find_scp_colon(raw: &str) -> Option<usize> {
    let search_from = match raw.find('[') {
        Some(open) => open + raw[open..].find(']')?,
        None => 0,
    };
    raw[search_from..].find(':').map(|idx| search_from + idx)
}

fn split_host_port(
    raw: &str,
    authority: &str,
    host_port: &str,
) -> Result<(String, Option<u16>), UrlError> {
    let ambiguous = || UrlError::AmbiguousAuthority {
        url: raw.to_owned(),
        authority: authority.to_owned(),
    };

    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']').ok_or_else(ambiguous)?;
        match after {
            "" => (host, None),
            _ => (host, Some(after.strip_prefix(':').ok_or_else(ambiguous)?)),
        }
    } else {
        match host_port.split_once(':') {
            None => (host_port, None),
            Some((host, port)) => (host, Some(port)),
        }
    };

    let port = match port {
        None | Some("") => None,
        Some(port) if port.bytes().all(|b| b.is_ascii_digit()) => {
            // All digits but out of TCP range: fall back to the default.
            port.parse::<u16>().ok()
        }
        Some(_) => return Err(ambiguous()),
    };

    Ok((host.to_owned(), port))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssh_uri_with_port() {
        let url = RemoteUrl::parse("ssh://user@host:2222/path").unwrap();
        assert_eq!(url.scheme(), Some("ssh"));
        assert_eq!(url.user(), Some("user"));
        assert_eq!(url.host(), "host");
        assert_eq!(url.port(), Some(2222));
        assert_eq!(url.path(), "/path");
        assert!(url.is_ssh());
        assert_eq!(url.ssh_port(), 2222);
    }

    #[test]
    fn parses_scp_like_address() {
        let url = RemoteUrl::parse("user@host:path").unwrap();
        assert_eq!(url.scheme(), None);
        assert_eq!(url.user(), Some("user"));
        assert_eq!(url.host(), "host");
        assert_eq!(url.port(), None);
        assert_eq!(url.path(), "path");
        assert!(url.is_ssh());
        assert_eq!(url.ssh_port(), DEFAULT_SSH_PORT);
    }

    #[test]
    fn scp_like_numeric_path_is_not_a_port() {
        let url = RemoteUrl::parse("git@host:2222/org/app.git").unwrap();
        assert_eq!(url.host(), "host");
        assert_eq!(url.port(), None);
        assert_eq!(url.path(), "2222/org/app.git");
    }

    #[test]
    fn https_is_not_ssh() {
        let url = RemoteUrl::parse("https://host/path").unwrap();
        assert!(!url.is_ssh());
        assert_eq!(url.host(), "host");
    }

    #[test]
    fn out_of_range_port_falls_back_to_default() {
        let url = RemoteUrl::parse("ssh://git@host:70000/repo").unwrap();
        assert_eq!(url.port(), None);
        assert_eq!(url.ssh_port(), 22);
    }

    #[test]
    fn host_with_extra_colon_is_rejected() {
        let err = RemoteUrl::parse("ssh://git@host:abc:22/repo").unwrap_err();
        assert!(matches!(err, UrlError::AmbiguousAuthority { .. }), "got: {err}");
        let err = RemoteUrl::parse("ssh://a:b/repo").unwrap_err();
        assert!(matches!(err, UrlError::AmbiguousAuthority { .. }), "got: {err}");
    }

    #[test]
    fn hosts_starting_with_dash_are_rejected() {
        for raw in ["ssh://-oProxyCommand=x/repo", "ssh://git@-oFoo:22/x.git", "-oFoo:x.git", "git@-oFoo:x.git"] {
            let err = RemoteUrl::parse(raw).unwrap_err();
            assert!(matches!(err, UrlError::OptionLikeHost { .. }), "{raw}: {err}");
        }
    }

    #[test]
    fn bracketed_ipv6_host_is_accepted() {
        let url = RemoteUrl::parse("ssh://git@[::1]:2222/repo").unwrap();
        assert_eq!(url.host(), "::1");
        assert_eq!(url.port(), Some(2222));
    }

    #[test]
    fn local_paths_are_rejected() {
        assert!(matches!(
            RemoteUrl::parse("/srv/git/app.git"),
            Err(UrlError::Unrecognized { .. })
        ));
        assert!(matches!(
            RemoteUrl::parse("./dir:with/colon"),
            Err(UrlError::Unrecognized { .. })
        ));
        assert!(RemoteUrl::parse("   ").is_err());
    }

    #[test]
    fn file_urls_may_omit_host() {
        let url = RemoteUrl::parse("file:///srv/git/app.git").unwrap();
        assert_eq!(url.host(), "");
        assert!(!url.is_ssh());
        assert!(matches!(
            RemoteUrl::parse("https:///nohost"),
            Err(UrlError::MissingHost { .. })
        ));
    }

    #[test]
    fn redacts_http_credentials_only() {
        let url = RemoteUrl::parse("https://token@github.com/org/app.git").unwrap();
        assert_eq!(url.redacted(), "https://[REDACTED]@github.com/org/app.git");
        let ssh = RemoteUrl::parse("ssh://git@github.com/org/app.git").unwrap();
        assert_eq!(ssh.redacted(), "ssh://git@github.com/org/app.git");
    }
}
