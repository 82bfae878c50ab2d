use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "/var/opt/gitsync/config/config.yml";
pub const DEFAULT_CACHE_ROOT_DIR: &str = "/var/opt/gitsync/cache";

/// `~/.ssh/known_hosts`, the file plain `ssh` consults without extra options.
pub fn default_known_hosts() -> Result<PathBuf, ConfigError> {
    Ok(home()?.join(".ssh").join("known_hosts"))
}

/// Replace a leading `~` with the home directory. Other paths pass through untouched.
pub fn expand_home(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(home()?.join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
