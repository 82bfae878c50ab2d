//! Typed configuration loading.
//!
//! # File layout
//!
//! ```yaml
//! config:
//!   keyfile: /keys/id_ed25519          # required
//!   cron_interval: "*/15 * * * *"      # required for run_type cron
//!   run_type: cron                     # once | cron
//!   cache_root_dir: /var/opt/gitsync/cache
//!   known_hosts_file: ~/.ssh/known_hosts
//!   trust_all_host_keys: false
//! repos:
//!   app:
//!     keyfile: /keys/app               # optional repo-level keyfile
//!     origin: { url: "git@a:org/app.git", source: true }
//!     backup: { url: "ssh://git@b:2222/app.git", excluded-refs: ["refs/pull/*"] }
//! ```
//!
//! Repos and remotes keep their declaration order. Inside a repo mapping the
//! key `keyfile` is reserved for the repo-level keyfile; every other key is a
//! remote.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, DeserializeSeed, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::{io_err, ConfigError};
use crate::paths::{expand_home, DEFAULT_CACHE_ROOT_DIR};
use crate::types::{RemoteName, RepoName, RunType};

const REPO_KEYFILE_KEY: &str = "keyfile";

// ---------------------------------------------------------------------------
// 1. File model
// ---------------------------------------------------------------------------

/// Serialization format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// The `config:` section as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub keyfile: PathBuf,
    #[serde(default)]
    pub cron_interval: Option<String>,
    #[serde(default)]
    pub run_type: Option<RunType>,
    #[serde(default)]
    pub cache_root_dir: Option<PathBuf>,
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,
    #[serde(default)]
    pub trust_all_host_keys: bool,
}

/// Root of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub config: Settings,
    /// Must declare at least one repo.
    pub repos: RepoTable,
}

/// One remote of a repo, as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDefinition {
    pub name: RemoteName,
    pub url: String,
    pub source: bool,
    pub keyfile: Option<PathBuf>,
    pub excluded_refs: Vec<String>,
}

/// One repo and its remotes, as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDefinition {
    pub name: RepoName,
    pub keyfile: Option<PathBuf>,
    pub remotes: Vec<RemoteDefinition>,
}

/// All declared repos, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepoTable(pub Vec<RepoDefinition>);

impl RepoTable {
    pub fn iter(&self) -> std::slice::Iter<'_, RepoDefinition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RepoDefinition> {
        self.0.iter().find(|repo| repo.name.0 == name)
    }
}

impl<'a> IntoIterator for &'a RepoTable {
    type Item = &'a RepoDefinition;
    type IntoIter = std::slice::Iter<'a, RepoDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// 2. Resolved model
// ---------------------------------------------------------------------------

/// Settings that do not come from the file: CLI flags or `GITSYNC_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub run_type: Option<RunType>,
    pub cache_root_dir: Option<PathBuf>,
}

/// How the process drives sync passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Cron { expression: String },
}

impl RunMode {
    pub fn run_type(&self) -> RunType {
        match self {
            RunMode::Once => RunType::Once,
            RunMode::Cron { .. } => RunType::Cron,
        }
    }
}

/// Validated global settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSettings {
    /// Root keyfile, the identity of last resort.
    pub keyfile: PathBuf,
    pub run_mode: RunMode,
    pub cache_root_dir: PathBuf,
    /// `None` means the default `~/.ssh/known_hosts`.
    pub known_hosts_file: Option<PathBuf>,
    pub trust_all_host_keys: bool,
}

/// A fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub path: PathBuf,
    pub settings: GlobalSettings,
    pub repos: RepoTable,
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Read, parse and resolve the config file at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Yaml`/`Json`
/// (with path + line context) if malformed.
pub fn load(path: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let format = ConfigFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse_str(&contents, format, path)?.resolve(path, overrides)
}

/// Parse config text without resolving it. `path` is only used in errors.
pub fn parse_str(contents: &str, format: ConfigFormat, path: &Path) -> Result<ConfigFile, ConfigError> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        ConfigFormat::Json => serde_json::from_str(contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl ConfigFile {
    /// Apply overrides and defaults, expand `~` and check mode-dependent settings.
    ///
    /// Precedence for `run_type` and `cache_root_dir`: override > file > default.
    pub fn resolve(self, path: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
        let ConfigFile { config, repos } = self;

        if config.keyfile.as_os_str().is_empty() {
            return Err(ConfigError::MissingSetting {
                field: "keyfile",
                reason: "a root keyfile is always required".to_owned(),
            });
        }

        let run_type = overrides.run_type.or(config.run_type).unwrap_or_default();
        let run_mode = match run_type {
            RunType::Once => RunMode::Once,
            RunType::Cron => {
                let expression = config
                    .cron_interval
                    .as_deref()
                    .map(str::trim)
                    .filter(|expr| !expr.is_empty())
                    .ok_or_else(|| ConfigError::MissingSetting {
                        field: "cron_interval",
                        reason: "run_type is cron".to_owned(),
                    })?;
                RunMode::Cron {
                    expression: expression.to_owned(),
                }
            }
        };

        let cache_root_dir = overrides
            .cache_root_dir
            .clone()
            .or(config.cache_root_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_ROOT_DIR));

        let settings = GlobalSettings {
            keyfile: expand_home(&config.keyfile)?,
            run_mode,
            cache_root_dir: expand_home(&cache_root_dir)?,
            known_hosts_file: config
                .known_hosts_file
                .as_deref()
                .map(expand_home)
                .transpose()?,
            trust_all_host_keys: config.trust_all_host_keys,
        };

        Ok(Config {
            path: path.to_path_buf(),
            settings,
            repos: expand_repo_keyfiles(repos)?,
        })
    }
}

fn expand_repo_keyfiles(repos: RepoTable) -> Result<RepoTable, ConfigError> {
    let expand = |keyfile: Option<PathBuf>| keyfile.as_deref().map(expand_home).transpose();
    let mut expanded = Vec::with_capacity(repos.len());
    for mut repo in repos.0 {
        repo.keyfile = expand(repo.keyfile)?;
        for remote in &mut repo.remotes {
            remote.keyfile = expand(remote.keyfile.take())?;
        }
        expanded.push(repo);
    }
    Ok(RepoTable(expanded))
}

// ---------------------------------------------------------------------------
// 4. Order-preserving deserialization of the repo table
// ---------------------------------------------------------------------------

impl<'de> Deserialize<'de> for RepoTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RepoTableVisitor)
    }
}

struct RepoTableVisitor;

impl<'de> Visitor<'de> for RepoTableVisitor {
    type Value = RepoTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-empty mapping of repo names to remote definitions")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut repos: Vec<RepoDefinition> = Vec::new();
        while let Some(name) = map.next_key::<String>()? {
            if repos.iter().any(|repo| repo.name.0 == name) {
                return Err(de::Error::custom(format_args!("duplicate repo '{name}'")));
            }
            let repo = map.next_value_seed(RepoSeed { name: &name })?;
            repos.push(repo);
        }
        if repos.is_empty() {
            return Err(de::Error::custom("no repos defined; at least one repo is required"));
        }
        Ok(RepoTable(repos))
    }
}

struct RepoSeed<'a> {
    name: &'a str,
}

impl<'de> DeserializeSeed<'de> for RepoSeed<'_> {
    type Value = RepoDefinition;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RepoSeed<'_> {
    type Value = RepoDefinition;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a mapping of remote definitions for repo '{}'", self.name)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut keyfile = None;
        let mut remotes: Vec<RemoteDefinition> = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            if key == REPO_KEYFILE_KEY {
                keyfile = map.next_value::<Option<PathBuf>>()?;
                continue;
            }
            if remotes.iter().any(|remote| remote.name.0 == key) {
                return Err(de::Error::custom(format_args!(
                    "duplicate remote '{key}' in repo '{}'",
                    self.name
                )));
            }
            let fields = map.next_value_seed(RemoteSeed {
                repo: self.name,
                name: &key,
            })?;
            remotes.push(RemoteDefinition {
                name: RemoteName::from(key),
                url: fields.url,
                source: fields.source,
                keyfile: fields.keyfile,
                excluded_refs: fields.excluded_refs,
            });
        }
        Ok(RepoDefinition {
            name: RepoName::from(self.name),
            keyfile,
            remotes,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteFields {
    url: String,
    #[serde(default)]
    source: bool,
    #[serde(default)]
    keyfile: Option<PathBuf>,
    #[serde(default, rename = "excluded-refs", alias = "excluded_refs")]
    excluded_refs: Vec<String>,
}

struct RemoteSeed<'a> {
    repo: &'a str,
    name: &'a str,
}

impl<'de> DeserializeSeed<'de> for RemoteSeed<'_> {
    type Value = RemoteFields;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RemoteSeed<'_> {
    type Value = RemoteFields;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a mapping definition for remote '{}' of repo '{}'",
            self.name, self.repo
        )
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        RemoteFields::deserialize(de::value::MapAccessDeserializer::new(map)).map_err(|e| {
            de::Error::custom(format_args!(
                "remote '{}' of repo '{}': {e}",
                self.name, self.repo
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
