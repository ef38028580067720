//! Configuration parsing and validation for ignition
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Console URL, credentials (inline or from the environment) and locators
//! - Automation timings and browser session options
//! - Validation with clear error messages

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),

    #[error("Environment variable {0} is not set")]
    MissingSecret(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string, reading
/// `*_env` credentials from the process environment
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    parse_config_with_env(content, |name| std::env::var(name).ok())
}

/// Parse and validate configuration, resolving `*_env` credentials through `env`
pub fn parse_config_with_env(
    content: &str,
    env: impl Fn(&str) -> Option<String>,
) -> ConfigResult<Config> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    let credentials = resolve_credentials(&raw.credentials, &env)?;
    Ok(Config::from_raw(raw, credentials))
}

fn resolve_credentials(
    raw: &RawCredentials,
    env: &impl Fn(&str) -> Option<String>,
) -> ConfigResult<Credentials> {
    Ok(Credentials {
        username: resolve_secret(&raw.username, &raw.username_env, env)?,
        password: resolve_secret(&raw.password, &raw.password_env, env)?,
    })
}

fn resolve_secret(
    inline: &Option<String>,
    var: &Option<String>,
    env: &impl Fn(&str) -> Option<String>,
) -> ConfigResult<String> {
    if let Some(value) = inline {
        return Ok(value.clone());
    }

    // Validation guarantees one of the two is present.
    let var = var.as_deref().unwrap_or_default();
    debug!(variable = %var, "Reading credential from environment");
    env(var).ok_or_else(|| ConfigError::MissingSecret(var.to_string()))
}
