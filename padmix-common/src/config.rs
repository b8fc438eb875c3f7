//! Configuration file resolution and TOML loading

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "PADMIX_CONFIG";

/// File name looked up inside the platform configuration directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. Platform config file, if it exists
///
/// Returns `None` when nothing applies, meaning compiled defaults are used.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    default_config_file().filter(|path| path.exists())
}

/// Platform location of the padmix configuration file.
///
/// Linux checks `~/.config/padmix/config.toml` first, then
/// `/etc/padmix/config.toml`.
pub fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("padmix").join(CONFIG_FILE_NAME));

    if cfg!(target_os = "linux") {
        if let Some(path) = user_config.as_ref() {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/padmix").join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// Load a TOML configuration file, or compiled defaults when `path` is `None`.
///
/// An explicitly named file that cannot be read or parsed is an error.
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No configuration file, using compiled defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config = toml::from_str::<T>(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
