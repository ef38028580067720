//! Validated configuration ready for use by the service

use crate::schema::{
    RawAutomationConfig, RawBrowserConfig, RawConfig, RawLocators, RawServiceConfig, RawTiming,
};
use ignition_browser_api::{BrowserKind, Locator, SessionOptions};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Control page loaded when no `site.url` is configured
pub const DEFAULT_SITE_URL: &str = "https://aternos.org/go/";

/// Default WebDriver server (chromedriver's default port)
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Default limit for a single WebDriver request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub site: SiteConfig,
    pub timing: AutomationTiming,
    pub browser: BrowserConfig,
    pub automation: AutomationLimits,
}

impl Config {
    /// Convert from raw config (after validation and secret resolution)
    pub fn from_raw(raw: RawConfig, credentials: Credentials) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            site: SiteConfig {
                url: raw.site.url.unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
                credentials,
                locators: Locators::from_raw(raw.locators),
            },
            timing: AutomationTiming::from_raw(raw.timing),
            browser: BrowserConfig::from_raw(raw.browser),
            automation: AutomationLimits::from_raw(raw.automation),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw
                .data_dir
                .unwrap_or_else(ignition_util::data_dir_without_env),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: ignition_util::data_dir_without_env(),
        }
    }
}

/// Everything the automation needs to know about the web console
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub url: String,
    pub credentials: Credentials,
    pub locators: Locators,
}

/// Console account
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where to find things on the console page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locators {
    pub login_field: Locator,
    pub password_field: Locator,
    pub login_button: Locator,
    /// Shown after a failed login
    pub login_error: Locator,
    pub start_button: Locator,
    pub status_label: Locator,
    /// Optional dialog after pressing start
    pub confirm_button: Locator,
}

impl Locators {
    fn from_raw(raw: RawLocators) -> Self {
        let defaults = Self::default();
        Self {
            login_field: raw.login_field_id.map(Locator::Id).unwrap_or(defaults.login_field),
            password_field: raw
                .password_field_id
                .map(Locator::Id)
                .unwrap_or(defaults.password_field),
            login_button: raw.login_button_id.map(Locator::Id).unwrap_or(defaults.login_button),
            login_error: raw
                .login_error_class
                .map(Locator::ClassName)
                .unwrap_or(defaults.login_error),
            start_button: raw
                .start_button_css
                .map(Locator::Css)
                .unwrap_or(defaults.start_button),
            status_label: raw
                .status_label_class
                .map(Locator::ClassName)
                .unwrap_or(defaults.status_label),
            confirm_button: raw
                .confirm_button_css
                .map(Locator::Css)
                .unwrap_or(defaults.confirm_button),
        }
    }
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            login_field: Locator::id("user"),
            password_field: Locator::id("password"),
            login_button: Locator::id("login"),
            login_error: Locator::class_name("error"),
            start_button: Locator::css("button.start"),
            status_label: Locator::class_name("statuslabel"),
            confirm_button: Locator::css("button.btn-confirm"),
        }
    }
}

/// Waits used by the automation driver.
///
/// The console gives no reliable "done" signal after logging in or pressing
/// start, so the two settle periods are plain sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationTiming {
    pub wait_timeout: Duration,
    pub login_settle: Duration,
    pub click_settle: Duration,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
}

impl AutomationTiming {
    fn from_raw(raw: RawTiming) -> Self {
        let defaults = Self::default();
        Self {
            wait_timeout: raw
                .wait_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.wait_timeout),
            login_settle: raw
                .login_settle_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.login_settle),
            click_settle: raw
                .click_settle_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.click_settle),
            poll_interval: raw
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            run_timeout: raw
                .run_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.run_timeout),
        }
    }
}

impl Default for AutomationTiming {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(20),
            login_settle: Duration::from_secs(8),
            click_settle: Duration::from_secs(3),
            poll_interval: Duration::from_millis(500),
            run_timeout: Duration::from_secs(90),
        }
    }
}

/// WebDriver connection and browser session shape
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub request_timeout: Duration,
    pub session: SessionOptions,
}

impl BrowserConfig {
    fn from_raw(raw: RawBrowserConfig) -> Self {
        let defaults = SessionOptions::default();
        Self {
            webdriver_url: raw
                .webdriver_url
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            request_timeout: raw
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            session: SessionOptions {
                // Validation already rejected unknown names.
                browser: raw
                    .browser
                    .and_then(|b| b.parse::<BrowserKind>().ok())
                    .unwrap_or(defaults.browser),
                headless: raw.headless.unwrap_or(defaults.headless),
                window_width: raw.window_width.unwrap_or(defaults.window_width),
                window_height: raw.window_height.unwrap_or(defaults.window_height),
                args: raw.args.unwrap_or(defaults.args),
            },
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self::from_raw(RawBrowserConfig::default())
    }
}

/// Resource limits for automation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationLimits {
    /// Browser sessions allowed at once; each one is a full browser process
    pub max_concurrent_runs: usize,
}

impl AutomationLimits {
    fn from_raw(raw: RawAutomationConfig) -> Self {
        Self {
            max_concurrent_runs: raw.max_concurrent_runs.unwrap_or(1),
        }
    }
}

impl Default for AutomationLimits {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_locators_match_console() {
        let locators = Locators::default();
        assert_eq!(locators.login_field, Locator::id("user"));
        assert_eq!(locators.status_label, Locator::class_name("statuslabel"));
        assert_eq!(locators.confirm_button, Locator::css("button.btn-confirm"));
    }

    #[test]
    fn locator_overrides_keep_their_strategy() {
        let locators = Locators::from_raw(RawLocators {
            login_field_id: Some("email".into()),
            start_button_css: Some("#start".into()),
            ..Default::default()
        });
        assert_eq!(locators.login_field, Locator::id("email"));
        assert_eq!(locators.start_button, Locator::css("#start"));
        assert_eq!(locators.login_button, Locator::id("login"));
    }

    #[test]
    fn default_timing() {
        let timing = AutomationTiming::default();
        assert_eq!(timing.wait_timeout, Duration::from_secs(20));
        assert_eq!(timing.login_settle, Duration::from_secs(8));
        assert_eq!(timing.click_settle, Duration::from_secs(3));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "steve".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("steve"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn browser_defaults() {
        let browser = BrowserConfig::default();
        assert_eq!(browser.webdriver_url, DEFAULT_WEBDRIVER_URL);
        assert!(browser.session.headless);
        assert_eq!(browser.session.window_width, 1920);
    }
}
