//! Usage record types

use chrono::{DateTime, Local};
use ignition_util::RequesterId;
use serde::{Deserialize, Serialize};

/// Usage of the start command by one requester.
///
/// `usage_count` is only meaningful while `last_used_at` falls on the current
/// calendar day. It is never zeroed; a new day simply stops it from counting
/// against the daily limit, and the next allowed start keeps incrementing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub requester_id: RequesterId,

    /// Best-effort label, overwritten on every allowed start
    pub display_name: String,

    /// Time of the most recent allowed start
    pub last_used_at: DateTime<Local>,

    /// Allowed starts recorded so far
    pub usage_count: u32,
}

impl UsageRecord {
    /// Whether the last allowed start happened on the same calendar day as `now`
    pub fn used_on_same_day(&self, now: &DateTime<Local>) -> bool {
        self.last_used_at.date_naive() == now.date_naive()
    }
}

/// Result of [`crate::UsageStore::reserve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The start was recorded. Holds the record as it was before the write.
    Recorded { previous: Option<UsageRecord> },

    /// The existing record was refused and left untouched
    Refused(UsageRecord),
}

/// Aggregate numbers across all requesters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of requesters that ever got a start allowed
    pub total_requesters: u64,

    /// Sum of all usage counters
    pub total_starts: u64,

    /// Heaviest users, highest `usage_count` first
    pub top: Vec<UsageRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn same_day_comparison_uses_calendar_date() {
        let record = UsageRecord {
            requester_id: RequesterId::new(1),
            display_name: "alice".into(),
            last_used_at: Local.with_ymd_and_hms(2025, 6, 1, 23, 59, 0).unwrap(),
            usage_count: 3,
        };

        let later_same_day = Local.with_ymd_and_hms(2025, 6, 1, 23, 59, 59).unwrap();
        let next_day = Local.with_ymd_and_hms(2025, 6, 2, 0, 0, 1).unwrap();

        assert!(record.used_on_same_day(&later_same_day));
        assert!(!record.used_on_same_day(&next_day));
    }
}
