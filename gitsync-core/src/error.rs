//! Error types for gitsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to parse a git remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// Matches neither the `scheme://` form nor the scp-like `user@host:path` form.
    #[error("'{url}' is neither a URI nor an scp-like git address")]
    Unrecognized { url: String },

    /// The authority could not be split into host and port without guessing.
    #[error("'{url}' has an ambiguous host:port authority '{authority}'")]
    AmbiguousAuthority { url: String, authority: String },

    /// A host is required for every transport except `file://`.
    #[error("'{url}' does not name a host")]
    MissingHost { url: String },

    /// A host starting with `-` would be read as an option by `ssh`/`ssh-keyscan`.
    #[error("'{url}' has host '{host}', which starts with '-'")]
    OptionLikeHost { url: String, host: String },
}

/// All configuration errors. Fatal: raised before any mirror exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    /// Only `.yml`, `.yaml` and `.json` files are understood.
    #[error("unsupported config file extension for {path}; expected .yml, .yaml or .json")]
    UnsupportedFormat { path: PathBuf },

    /// YAML parse error: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON parse error: includes file path and line context from serde_json.
    #[error("failed to parse config at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A setting that is only optional in some modes was left out.
    #[error("missing required setting '{field}': {reason}")]
    MissingSetting { field: &'static str, reason: String },

    /// A setting was present but its value is not acceptable.
    #[error("invalid value '{value}' for '{field}': expected {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A keyfile named in the config does not exist on disk.
    #[error("couldn't find key file at {path}")]
    KeyfileNotFound { path: PathBuf },

    /// A remote URL could not be parsed.
    #[error("invalid url for remote '{remote}': {source}")]
    InvalidUrl {
        remote: String,
        #[source]
        source: UrlError,
    },

    /// Excluded ref patterns must address refs under `refs/`.
    #[error("invalid excluded ref pattern '{pattern}' for remote '{remote}': must start with 'refs/'")]
    InvalidRefPattern { remote: String, pattern: String },

    /// Repo names become cache directory names.
    #[error("invalid repo name '{name}': must be a single non-empty path component")]
    InvalidRepoName { name: String },

    /// Exactly one remote per repo must carry `source: true`.
    #[error("repo '{repo}' must have exactly one source remote, found {count}")]
    SourceRemoteCount { repo: String, count: usize },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.ssh/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
