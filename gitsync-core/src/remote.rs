//! [`RemoteDescriptor`]: immutable description of one git remote.

use std::path::{Path, PathBuf};

use crate::config::RemoteDefinition;
use crate::error::ConfigError;
use crate::types::RemoteName;
use crate::url::RemoteUrl;

/// One remote of a mirrored repo.
///
/// Built once from configuration. The URL is parsed and any keyfile is
/// checked for existence at construction, so a descriptor that exists is
/// always usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    name: RemoteName,
    url: RemoteUrl,
    is_source: bool,
    keyfile: Option<PathBuf>,
    excluded_refs: Vec<String>,
}

impl RemoteDescriptor {
    pub fn new(
        name: impl Into<RemoteName>,
        url: &str,
        is_source: bool,
        keyfile: Option<PathBuf>,
        excluded_refs: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let url = RemoteUrl::parse(url).map_err(|source| ConfigError::InvalidUrl {
            remote: name.0.clone(),
            source,
        })?;

        if let Some(path) = &keyfile {
            if !path.is_file() {
                return Err(ConfigError::KeyfileNotFound { path: path.clone() });
            }
        }

        let excluded_refs = excluded_refs
            .into_iter()
            .map(|pattern| normalize_ref_pattern(&name, pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            url,
            is_source,
            keyfile,
            excluded_refs,
        })
    }

    /// Build a descriptor from its config-file definition.
    pub fn from_definition(def: &RemoteDefinition) -> Result<Self, ConfigError> {
        Self::new(
            def.name.clone(),
            &def.url,
            def.source,
            def.keyfile.clone(),
            def.excluded_refs.clone(),
        )
    }

    pub fn name(&self) -> &RemoteName {
        &self.name
    }

    pub fn url(&self) -> &RemoteUrl {
        &self.url
    }

    pub fn is_source(&self) -> bool {
        self.is_source
    }

    /// Remote-level keyfile override, the most specific identity.
    pub fn keyfile(&self) -> Option<&Path> {
        self.keyfile.as_deref()
    }

    /// Ref patterns (e.g. `refs/pull/*`) never pushed to this remote.
    pub fn excluded_refs(&self) -> &[String] {
        &self.excluded_refs
    }
}

/// Accepts `refs/...` or `^refs/...` and stores the pattern without the caret.
fn normalize_ref_pattern(remote: &RemoteName, pattern: String) -> Result<String, ConfigError> {
    let trimmed = pattern.trim();
    let bare = trimmed.strip_prefix('^').unwrap_or(trimmed);
    if !bare.starts_with("refs/") {
        return Err(ConfigError::InvalidRefPattern {
            remote: remote.0.clone(),
            pattern,
        });
    }
    Ok(bare.to_owned())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
