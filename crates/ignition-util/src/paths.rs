//! Default paths for ignition
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/ignition/config.toml` or `~/.config/ignition/config.toml`
//! - Data: `$XDG_DATA_HOME/ignition` or `~/.local/share/ignition`

use std::path::PathBuf;

/// Environment variable for overriding the data directory
pub const IGNITION_DATA_DIR_ENV: &str = "IGNITION_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "ignition";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "usage.db";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/ignition/config.toml`
/// 2. `~/.config/ignition/config.toml`
/// 3. `/etc/ignition/config.toml` (no home directory at all)
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$IGNITION_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/ignition` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/ignition` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(IGNITION_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking IGNITION_DATA_DIR.
/// Used for config defaults where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_contains_app_dir() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("ignition"));
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn data_dir_contains_app_dir() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("ignition"));
    }
}
