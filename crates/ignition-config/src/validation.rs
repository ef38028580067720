//! Configuration validation

use crate::schema::{RawBrowserConfig, RawConfig, RawCredentials, RawLocators, RawTiming};
use crate::settings::{AutomationTiming, DEFAULT_REQUEST_TIMEOUT};
use ignition_browser_api::BrowserKind;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("credentials: {0} or {0}_env is required")]
    MissingCredential(String),

    #[error("credentials: set either {0} or {0}_env, not both")]
    ConflictingCredential(String),
}

impl ValidationError {
    fn field(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(url) = &config.site.url {
        errors.extend(validate_url("site.url", url));
    }

    errors.extend(validate_credentials(&config.credentials));
    errors.extend(validate_locators(&config.locators));
    errors.extend(validate_timing(&config.timing));
    errors.extend(validate_browser(&config.browser));
    errors.extend(validate_timeouts(&config.timing, &config.browser));

    if config.automation.max_concurrent_runs == Some(0) {
        errors.push(ValidationError::field(
            "automation.max_concurrent_runs",
            "must be at least 1",
        ));
    }

    errors
}

fn validate_url(field: &str, url: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ValidationError::field(
            field,
            format!("'{}' must be an http:// or https:// URL", url),
        ));
    }

    errors
}

fn validate_credentials(creds: &RawCredentials) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let pairs = [
        ("username", &creds.username, &creds.username_env),
        ("password", &creds.password, &creds.password_env),
    ];

    for (name, inline, env) in pairs {
        match (inline, env) {
            (None, None) => errors.push(ValidationError::MissingCredential(name.into())),
            (Some(_), Some(_)) => errors.push(ValidationError::ConflictingCredential(name.into())),
            (_, Some(var)) if var.trim().is_empty() => errors.push(ValidationError::field(
                &format!("credentials.{}_env", name),
                "variable name cannot be empty",
            )),
            _ => {}
        }
    }

    errors
}

fn validate_locators(locators: &RawLocators) -> Vec<ValidationError> {
    let fields = [
        ("locators.login_field_id", &locators.login_field_id),
        ("locators.password_field_id", &locators.password_field_id),
        ("locators.login_button_id", &locators.login_button_id),
        ("locators.login_error_class", &locators.login_error_class),
        ("locators.start_button_css", &locators.start_button_css),
        ("locators.status_label_class", &locators.status_label_class),
        ("locators.confirm_button_css", &locators.confirm_button_css),
    ];

    fields
        .into_iter()
        .filter(|(_, value)| value.as_ref().is_some_and(|v| v.trim().is_empty()))
        .map(|(field, _)| ValidationError::field(field, "cannot be empty"))
        .collect()
}

fn validate_timing(timing: &RawTiming) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if timing.wait_timeout_secs == Some(0) {
        errors.push(ValidationError::field("timing.wait_timeout_secs", "must be positive"));
    }
    if timing.poll_interval_ms == Some(0) {
        errors.push(ValidationError::field("timing.poll_interval_ms", "must be positive"));
    }
    if timing.run_timeout_secs == Some(0) {
        errors.push(ValidationError::field("timing.run_timeout_secs", "must be positive"));
    }

    errors
}

/// Compare timeouts as they will be used, defaults filled in.
///
/// A run must outlast a single wait, and a single WebDriver request must end
/// before the run is aborted.
fn validate_timeouts(timing: &RawTiming, browser: &RawBrowserConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let defaults = AutomationTiming::default();

    let wait = timing
        .wait_timeout_secs
        .unwrap_or(defaults.wait_timeout.as_secs());
    let run = timing
        .run_timeout_secs
        .unwrap_or(defaults.run_timeout.as_secs());
    let request = browser
        .request_timeout_secs
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs());

    // Zeroes are reported on their own.
    if wait == 0 || run == 0 || request == 0 {
        return errors;
    }

    if run < wait {
        errors.push(ValidationError::field(
            "timing.run_timeout_secs",
            format!("{}s is shorter than wait_timeout_secs ({}s)", run, wait),
        ));
    }
    if request >= run {
        errors.push(ValidationError::field(
            "browser.request_timeout_secs",
            format!("{}s must be shorter than run_timeout_secs ({}s)", request, run),
        ));
    }

    errors
}

fn validate_browser(browser: &RawBrowserConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(url) = &browser.webdriver_url {
        errors.extend(validate_url("browser.webdriver_url", url));
    }

    if let Some(name) = &browser.browser
        && let Err(e) = name.parse::<BrowserKind>()
    {
        errors.push(ValidationError::field("browser.browser", e));
    }

    if browser.window_width == Some(0) || browser.window_height == Some(0) {
        errors.push(ValidationError::field(
            "browser.window_width/window_height",
            "must be positive",
        ));
    }

    if browser.request_timeout_secs == Some(0) {
        errors.push(ValidationError::field("browser.request_timeout_secs", "must be positive"));
    }

    errors
}
