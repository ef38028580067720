//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub service: RawServiceConfig,

    /// The web console that starts the game server
    #[serde(default)]
    pub site: RawSiteConfig,

    #[serde(default)]
    pub credentials: RawCredentials,

    #[serde(default)]
    pub locators: RawLocators,

    #[serde(default)]
    pub timing: RawTiming,

    #[serde(default)]
    pub browser: RawBrowserConfig,

    #[serde(default)]
    pub automation: RawAutomationConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the usage database
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSiteConfig {
    /// Control page to load (login form lives here)
    pub url: Option<String>,
}

/// Console account. Each value may be given inline or as the name of an
/// environment variable to read it from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCredentials {
    pub username: Option<String>,
    pub username_env: Option<String>,
    pub password: Option<String>,
    pub password_env: Option<String>,
}

/// Element locators on the console page
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLocators {
    pub login_field_id: Option<String>,
    pub password_field_id: Option<String>,
    pub login_button_id: Option<String>,
    pub login_error_class: Option<String>,
    pub start_button_css: Option<String>,
    pub status_label_class: Option<String>,
    pub confirm_button_css: Option<String>,
}

/// Waits and settle periods
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTiming {
    /// Upper bound for waiting on an element
    pub wait_timeout_secs: Option<u64>,

    /// Fixed pause after submitting the login form
    pub login_settle_secs: Option<u64>,

    /// Fixed pause after clicking start
    pub click_settle_secs: Option<u64>,

    /// How often to re-check while waiting on an element
    pub poll_interval_ms: Option<u64>,

    /// Upper bound for one whole automation run
    pub run_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBrowserConfig {
    /// WebDriver server URL (chromedriver, geckodriver)
    pub webdriver_url: Option<String>,

    /// "chrome" or "firefox"
    pub browser: Option<String>,

    pub headless: Option<bool>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,

    /// Replaces the default browser switches when set
    pub args: Option<Vec<String>>,

    /// Upper bound for one WebDriver HTTP request
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAutomationConfig {
    /// Browser sessions allowed to run at the same time
    pub max_concurrent_runs: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_schema() {
        let toml_str = r#"
            config_version = 1

            [service]
            data_dir = "/var/lib/ignition"

            [site]
            url = "https://console.example.com/go/"

            [credentials]
            username = "steve"
            password_env = "CONSOLE_PASS"

            [locators]
            start_button_css = "button#start"

            [timing]
            wait_timeout_secs = 30
            login_settle_secs = 5

            [browser]
            webdriver_url = "http://localhost:4444"
            browser = "firefox"
            headless = false

            [automation]
            max_concurrent_runs = 2
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.credentials.username.as_deref(), Some("steve"));
        assert_eq!(config.credentials.password_env.as_deref(), Some("CONSOLE_PASS"));
        assert_eq!(config.locators.start_button_css.as_deref(), Some("button#start"));
        assert_eq!(config.timing.wait_timeout_secs, Some(30));
        assert_eq!(config.browser.headless, Some(false));
        assert_eq!(config.automation.max_concurrent_runs, Some(2));
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.site.url.is_none());
        assert!(config.locators.login_field_id.is_none());
    }
}
