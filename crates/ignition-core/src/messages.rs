//! Text handed to the message delivery layer

use ignition_store::UsageStats;
use ignition_util::{RequesterId, format_short};
use std::fmt::Write;

use crate::{AutomationOutcome, COOLDOWN, DAILY_START_LIMIT, DenyReason};

/// Whole minutes until the cooldown is over, counted the way users read a
/// clock: 1m59s elapsed still leaves "4 minutes"
fn cooldown_minutes_left(elapsed: std::time::Duration) -> u64 {
    let total = COOLDOWN.as_secs() / 60;
    total.saturating_sub(elapsed.as_secs() / 60)
}

/// Message for a refused start
pub fn render_denial(reason: &DenyReason) -> String {
    match reason {
        DenyReason::Cooldown { elapsed } => format!(
            "⏳ Please wait a bit! Next start available in {} minutes",
            cooldown_minutes_left(*elapsed)
        ),
        DenyReason::DailyLimit { .. } => format!(
            "🚫 Daily limit of {} starts reached. Try again tomorrow!",
            DAILY_START_LIMIT
        ),
        DenyReason::StoreUnavailable { .. } => {
            "⚠️ Internal error: start requests cannot be checked right now. Please try again later"
                .to_string()
        }
    }
}

/// Message for the requester after an automation run
pub fn render_user_message(outcome: &AutomationOutcome, display_name: &str) -> String {
    format!("{}\n\nRequested by: {}", outcome.message, display_name)
}

/// Message for the administrator after an automation run
pub fn render_admin_notification(
    requester_id: RequesterId,
    display_name: &str,
    outcome: &AutomationOutcome,
) -> String {
    format!("{} (ID: {})\n{}", display_name, requester_id, outcome.message)
}

/// Usage overview
pub fn render_stats(stats: &UsageStats) -> String {
    let mut out = String::from("📊 Usage statistics\n");
    let _ = writeln!(out, "Requesters: {}", stats.total_requesters);
    let _ = writeln!(out, "Total starts: {}", stats.total_starts);

    if stats.top.is_empty() {
        out.push_str("\nNo starts recorded yet");
        return out;
    }

    out.push_str("\nTop requesters:");
    for (rank, record) in stats.top.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {} (ID: {}): {} starts, last {}",
            rank + 1,
            record.display_name,
            record.requester_id,
            record.usage_count,
            format_short(&record.last_used_at)
        );
    }
    out
}

/// The start policy, in plain words
pub fn render_rules() -> String {
    format!(
        "📋 Server start rules\n\
         • One start every {} minutes per person\n\
         • At most {} starts per person per day\n\
         • The server needs 2-5 minutes to come up after a start",
        COOLDOWN.as_secs() / 60,
        DAILY_START_LIMIT
    )
}
