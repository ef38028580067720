//! Wall-clock time for ignition
//!
//! Every time-sensitive decision takes a `DateTime<Local>` argument so that
//! callers and tests can inject the clock. Production callers get it from
//! [`now`].
//!
//! # Mock Time for Development
//!
//! In debug builds, the `IGNITION_MOCK_TIME` environment variable shifts the
//! clock to a fixed starting point that then advances in real time. Handy for
//! poking at day rollover of the usage counters by hand.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 23:58:00`)

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "IGNITION_MOCK_TIME";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            match parse_mock_time(&raw) {
                Some(mock_dt) => {
                    let offset = mock_dt.signed_duration_since(Local::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = MOCK_TIME_FORMAT,
                        "Invalid mock time, using the system clock"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

fn parse_mock_time(raw: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), MOCK_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current local time, respecting `IGNITION_MOCK_TIME` in debug builds.
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Short `dd.mm HH:MM` form used in usage listings.
pub fn format_short(dt: &DateTime<Local>) -> String {
    dt.format("%d.%m %H:%M").to_string()
}

/// Full date and time for logs and diagnostics.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mock_time_accepts_expected_format() {
        let dt = parse_mock_time("2025-12-25 14:30:00").unwrap();
        assert_eq!(format_datetime_full(&dt), "2025-12-25 14:30:00");
    }

    #[test]
    fn parse_mock_time_rejects_garbage() {
        assert!(parse_mock_time("tomorrow").is_none());
        assert!(parse_mock_time("2025-12-25").is_none());
    }

    #[test]
    fn short_format() {
        let dt = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(format_short(&dt), "07.03 09:05");
    }
}
