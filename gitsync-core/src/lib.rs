//! gitsync core library: domain types, remote URLs, configuration, errors.
//!
//! - [`types`]: newtypes and enums
//! - [`url`]: [`RemoteUrl`] parser
//! - [`remote`]: [`RemoteDescriptor`]
//! - [`config`]: typed config loading
//! - [`error`]: [`ConfigError`], [`UrlError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod remote;
pub mod types;
pub mod url;

pub use config::{Config, GlobalSettings, Overrides, RepoDefinition, RepoTable, RunMode};
pub use error::{ConfigError, UrlError};
pub use remote::RemoteDescriptor;
pub use types::{RemoteName, RepoName, RunType};
pub use url::RemoteUrl;
