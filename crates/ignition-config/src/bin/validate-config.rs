//! Config validation CLI tool
//!
//! Validates an ignition configuration file and reports any errors.

use ignition_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates an ignition configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match ignition_config::load_config(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", ignition_config::CURRENT_CONFIG_VERSION);
            println!("  Console URL:    {}", config.site.url);
            println!("  Account:        {}", config.site.credentials.username);
            println!("  Data dir:       {}", config.service.data_dir.display());
            println!(
                "  Browser:        {} via {}{}",
                config.browser.session.browser,
                config.browser.webdriver_url,
                if config.browser.session.headless { " (headless)" } else { "" }
            );
            println!(
                "  Waits:          {}s element, {}s login settle, {}s click settle",
                config.timing.wait_timeout.as_secs(),
                config.timing.login_settle.as_secs(),
                config.timing.click_settle.as_secs()
            );
            println!("  Parallel runs:  {}", config.automation.max_concurrent_runs);
            println!();
            println!("Locators:");
            let locators = &config.site.locators;
            for (name, locator) in [
                ("login field", &locators.login_field),
                ("password field", &locators.password_field),
                ("login button", &locators.login_button),
                ("login error", &locators.login_error),
                ("start button", &locators.start_button),
                ("status label", &locators.status_label),
                ("confirm button", &locators.confirm_button),
            ] {
                println!("  - {}: {}", name, locator);
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ignition_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ignition_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ignition_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ignition_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        ignition_config::CURRENT_CONFIG_VERSION
                    );
                }
                ignition_config::ConfigError::MissingSecret(var) => {
                    eprintln!("Credential variable {} is not set in the environment", var);
                }
            }
            ExitCode::from(1)
        }
    }
}
