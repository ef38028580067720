//! Browser session options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which browser the backend should launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BrowserKind::Chrome),
            "firefox" => Ok(BrowserKind::Firefox),
            other => Err(format!("Unknown browser: {}", other)),
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserKind::Chrome => write!(f, "chrome"),
            BrowserKind::Firefox => write!(f, "firefox"),
        }
    }
}

/// How to configure a fresh browser session for unattended use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub browser: BrowserKind,

    /// Run without a visible window
    pub headless: bool,

    /// Fixed viewport width in pixels
    pub window_width: u32,

    /// Fixed viewport height in pixels
    pub window_height: u32,

    /// Extra command-line switches for the browser process
    pub args: Vec<String>,
}

impl SessionOptions {
    /// Switches that keep a containerized browser from falling over
    pub fn default_args() -> Vec<String> {
        vec![
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            "--disable-gpu".into(),
        ]
    }

    /// All switches to pass to the browser, including headless and window size
    pub fn browser_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if self.headless {
            args.push("--headless".into());
        }
        args.push(format!("--window-size={},{}", self.window_width, self.window_height));
        args
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            args: Self::default_args(),
        }
    }
}
