//! Result of one automation run

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    /// Server was already running
    AlreadyOnline,
    /// Start was pressed
    Starting,
    /// Console rejected the credentials
    LoginFailed,
    /// Server is queued, loading or otherwise mid-transition
    Busy,
    /// The console did not become ready in time
    Timeout,
    /// Anything else, including browser start-up failures
    UnknownError,
}

impl OutcomeCategory {
    pub fn is_success(self) -> bool {
        matches!(self, OutcomeCategory::AlreadyOnline | OutcomeCategory::Starting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeCategory::AlreadyOnline => "already_online",
            OutcomeCategory::Starting => "starting",
            OutcomeCategory::LoginFailed => "login_failed",
            OutcomeCategory::Busy => "busy",
            OutcomeCategory::Timeout => "timeout",
            OutcomeCategory::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one [`crate::AutomationDriver`] run, with a user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationOutcome {
    pub success: bool,
    pub message: String,
    pub category: OutcomeCategory,
}

impl AutomationOutcome {
    fn new(category: OutcomeCategory, message: impl Into<String>) -> Self {
        Self {
            success: category.is_success(),
            message: message.into(),
            category,
        }
    }

    pub fn already_online() -> Self {
        Self::new(
            OutcomeCategory::AlreadyOnline,
            "🟢 The server is already online! Come on in!",
        )
    }

    pub fn starting() -> Self {
        Self::new(
            OutcomeCategory::Starting,
            "✅ The server is starting! It will be reachable in 2-5 minutes 🚀",
        )
    }

    pub fn login_failed() -> Self {
        Self::new(
            OutcomeCategory::LoginFailed,
            "❌ Could not log in to the server console",
        )
    }

    pub fn busy() -> Self {
        Self::new(
            OutcomeCategory::Busy,
            "⏳ The server is queued or updating, try again shortly",
        )
    }

    pub fn timeout() -> Self {
        Self::new(
            OutcomeCategory::Timeout,
            "⏰ The server console is not responding, try again later",
        )
    }

    pub fn unknown_error(detail: impl fmt::Display) -> Self {
        Self::new(OutcomeCategory::UnknownError, format!("❌ Error: {}", detail))
    }
}
