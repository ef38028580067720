//! Per-requester start gating

use chrono::{DateTime, Local};
use ignition_store::{Reservation, StoreError, UsageRecord, UsageStore};
use ignition_util::{KeyedLocks, RequesterId, format_datetime_full};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Minimum spacing between two allowed starts by the same requester
pub const COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Allowed starts per requester per calendar day
pub const DAILY_START_LIMIT: u32 = 10;

/// Why a start was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DenyReason {
    /// Last allowed start was less than [`COOLDOWN`] ago
    Cooldown { elapsed: Duration },

    /// [`DAILY_START_LIMIT`] reached today
    DailyLimit { used: u32 },

    /// The usage store could not be read or written; the gate fails closed
    StoreUnavailable { detail: String },
}

impl DenyReason {
    /// Stable short code for logs
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Cooldown { .. } => "cooldown",
            DenyReason::DailyLimit { .. } => "daily-limit",
            DenyReason::StoreUnavailable { .. } => "store-unavailable",
        }
    }

    /// Whether the gate itself is broken rather than the requester being limited
    pub fn is_internal(&self) -> bool {
        matches!(self, DenyReason::StoreUnavailable { .. })
    }
}

/// Gate decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied {
        reason: DenyReason,
        retry_after: Option<Duration>,
    },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    fn store_unavailable(e: StoreError) -> Self {
        Verdict::Denied {
            reason: DenyReason::StoreUnavailable {
                detail: e.to_string(),
            },
            retry_after: None,
        }
    }
}

/// Apply the fixed policy to an existing record.
///
/// Returns `None` when the record does not stand in the way of a start.
/// The cooldown comparison uses the exact elapsed time. The daily limit only
/// applies while the last use falls on today's date, so a counter left at the
/// limit yesterday lets the requester through and keeps counting from there.
pub fn evaluate(record: &UsageRecord, now: DateTime<Local>) -> Option<Verdict> {
    // A last use in the future (clock stepped back) counts as "just now".
    let elapsed = now
        .signed_duration_since(record.last_used_at)
        .to_std()
        .unwrap_or(Duration::ZERO);

    if elapsed < COOLDOWN {
        return Some(Verdict::Denied {
            reason: DenyReason::Cooldown { elapsed },
            retry_after: Some(COOLDOWN - elapsed),
        });
    }

    if record.usage_count >= DAILY_START_LIMIT && record.used_on_same_day(&now) {
        return Some(Verdict::Denied {
            reason: DenyReason::DailyLimit {
                used: record.usage_count,
            },
            retry_after: None,
        });
    }

    None
}

/// Decides whether a requester may trigger a start, and records allowed ones
pub struct Gatekeeper {
    store: Arc<dyn UsageStore>,
    locks: KeyedLocks<RequesterId>,
}

impl Gatekeeper {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    /// Check the policy for `requester_id` and, if allowed, record the start.
    ///
    /// The store runs read, decision and write as one transaction, so two
    /// simultaneous requests from one requester cannot both be allowed, even
    /// from separate processes sharing the database. Requests inside this
    /// process also queue on a per-requester lock first.
    pub fn check_and_reserve(
        &self,
        requester_id: RequesterId,
        display_name: &str,
        now: DateTime<Local>,
    ) -> Verdict {
        self.locks.with_lock(&requester_id, || {
            self.check_and_reserve_locked(requester_id, display_name, now)
        })
    }

    fn check_and_reserve_locked(
        &self,
        requester_id: RequesterId,
        display_name: &str,
        now: DateTime<Local>,
    ) -> Verdict {
        let mut denial = None;
        let reservation = self.store.reserve(
            requester_id,
            display_name,
            now,
            &mut |record: &UsageRecord| {
                denial = evaluate(record, now);
                denial.is_none()
            },
        );

        match reservation {
            Err(e) => {
                error!(requester_id = %requester_id, error = %e, "Usage store reservation failed");
                Verdict::store_unavailable(e)
            }
            Ok(Reservation::Refused(record)) => {
                let denied = denial.unwrap_or_else(|| {
                    Verdict::store_unavailable(StoreError::Unavailable(
                        "reservation refused without a decision".into(),
                    ))
                });
                if let Verdict::Denied { reason, retry_after } = &denied {
                    info!(
                        requester_id = %requester_id,
                        reason = reason.code(),
                        retry_after_secs = retry_after.map(|d| d.as_secs()),
                        usage_count = record.usage_count,
                        last_used = %format_datetime_full(&record.last_used_at),
                        "Start denied"
                    );
                }
                denied
            }
            Ok(Reservation::Recorded { previous }) => {
                if previous.is_none() {
                    debug!(requester_id = %requester_id, "First start for requester");
                }
                info!(
                    requester_id = %requester_id,
                    display_name = %display_name,
                    usage_count = previous.map(|r| r.usage_count + 1).unwrap_or(1),
                    "Start allowed"
                );
                Verdict::Allowed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ignition_store::{SqliteStore, StoreResult, UsageStats};
    use std::sync::Barrier;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn gatekeeper() -> (Gatekeeper, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        (Gatekeeper::new(store.clone()), store)
    }

    fn record(count: u32, last_used_at: DateTime<Local>) -> UsageRecord {
        UsageRecord {
            requester_id: RequesterId::new(1),
            display_name: "alice".into(),
            last_used_at,
            usage_count: count,
        }
    }

    #[test]
    fn first_request_is_allowed() {
        let (gate, store) = gatekeeper();
        let id = RequesterId::new(1);

        assert_eq!(gate.check_and_reserve(id, "@alice", t0()), Verdict::Allowed);

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.usage_count, 1);
        assert_eq!(record.last_used_at, t0());
    }

    #[test]
    fn second_request_within_cooldown_is_denied() {
        let (gate, store) = gatekeeper();
        let id = RequesterId::new(1);

        assert!(gate.check_and_reserve(id, "@alice", t0()).is_allowed());

        let later = t0() + chrono::Duration::seconds(60);
        let verdict = gate.check_and_reserve(id, "Alice (renamed)", later);
        assert_eq!(
            verdict,
            Verdict::Denied {
                reason: DenyReason::Cooldown {
                    elapsed: Duration::from_secs(60)
                },
                retry_after: Some(Duration::from_secs(240)),
            }
        );

        // Denials leave the record untouched.
        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.usage_count, 1);
        assert_eq!(record.display_name, "@alice");
    }

    #[test]
    fn cooldown_uses_exact_elapsed_time() {
        let just_short = t0() + chrono::Duration::seconds(299);
        let verdict = evaluate(&record(1, t0()), just_short).unwrap();
        assert!(matches!(
            verdict,
            Verdict::Denied { reason: DenyReason::Cooldown { .. }, retry_after: Some(d) } if d == Duration::from_secs(1)
        ));

        let exactly = t0() + chrono::Duration::seconds(300);
        assert!(evaluate(&record(1, t0()), exactly).is_none());
    }

    #[test]
    fn allowed_after_cooldown_increments_by_one() {
        let (gate, store) = gatekeeper();
        let id = RequesterId::new(1);

        assert!(gate.check_and_reserve(id, "@alice", t0()).is_allowed());
        let later = t0() + chrono::Duration::minutes(6);
        assert!(gate.check_and_reserve(id, "Alice", later).is_allowed());

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.usage_count, 2);
        assert_eq!(record.last_used_at, later);
        assert_eq!(record.display_name, "Alice");
    }

    #[test]
    fn daily_limit_applies_on_same_day() {
        let earlier_today = t0() - chrono::Duration::hours(1);
        let verdict = evaluate(&record(10, earlier_today), t0()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Denied {
                reason: DenyReason::DailyLimit { used: 10 },
                retry_after: None,
            }
        );
    }

    #[test]
    fn stale_counter_from_yesterday_does_not_block() {
        let (gate, store) = gatekeeper();
        let id = RequesterId::new(1);

        // Ten starts yesterday, spaced past the cooldown.
        let yesterday = t0() - chrono::Duration::days(1);
        for i in 0..10 {
            let at = yesterday + chrono::Duration::minutes(10 * i);
            assert!(gate.check_and_reserve(id, "@alice", at).is_allowed());
        }
        assert_eq!(store.get(id).unwrap().unwrap().usage_count, 10);

        // Today the stale counter is ignored and keeps growing from 10.
        assert!(gate.check_and_reserve(id, "@alice", t0()).is_allowed());
        assert_eq!(store.get(id).unwrap().unwrap().usage_count, 11);

        // Now the last use is today and the count is over the limit.
        let later = t0() + chrono::Duration::minutes(10);
        let verdict = gate.check_and_reserve(id, "@alice", later);
        assert!(matches!(
            verdict,
            Verdict::Denied { reason: DenyReason::DailyLimit { used: 11 }, .. }
        ));
    }

    #[test]
    fn future_last_use_counts_as_cooldown() {
        let verdict = evaluate(&record(1, t0() + chrono::Duration::minutes(2)), t0()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Denied {
                reason: DenyReason::Cooldown {
                    elapsed: Duration::ZERO
                },
                retry_after: Some(COOLDOWN),
            }
        );
    }

    #[test]
    fn concurrent_requests_from_one_requester_allow_exactly_one() {
        let (gate, store) = gatekeeper();
        let id = RequesterId::new(7);
        let barrier = Barrier::new(8);

        let allowed: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        gate.check_and_reserve(id, "@racer", t0()).is_allowed()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|allowed| *allowed)
                .count()
        });

        assert_eq!(allowed, 1);
        assert_eq!(store.get(id).unwrap().unwrap().usage_count, 1);
    }

    #[test]
    fn gatekeepers_sharing_a_database_file_allow_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.db");
        let gates = [
            Gatekeeper::new(Arc::new(SqliteStore::open(&path).unwrap())),
            Gatekeeper::new(Arc::new(SqliteStore::open(&path).unwrap())),
        ];

        for round in 0..100 {
            let id = RequesterId::new(round);
            let barrier = Barrier::new(gates.len());

            let allowed = std::thread::scope(|s| {
                let handles: Vec<_> = gates
                    .iter()
                    .map(|gate| {
                        let barrier = &barrier;
                        s.spawn(move || {
                            barrier.wait();
                            gate.check_and_reserve(id, "@racer", t0()).is_allowed()
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .filter(|allowed| *allowed)
                    .count()
            });

            assert_eq!(allowed, 1, "round {}", round);
            let record = gates[1].store().get(id).unwrap().unwrap();
            assert_eq!(record.usage_count, 1);
        }
    }

    struct BrokenStore {
        fail_reads: bool,
    }

    impl UsageStore for BrokenStore {
        fn get(&self, _requester_id: RequesterId) -> StoreResult<Option<UsageRecord>> {
            if self.fail_reads {
                Err(StoreError::Unavailable("disk on fire".into()))
            } else {
                Ok(None)
            }
        }

        fn upsert_on_allow(
            &self,
            _requester_id: RequesterId,
            _display_name: &str,
            _now: DateTime<Local>,
        ) -> StoreResult<()> {
            Err(StoreError::Database("database is locked".into()))
        }

        fn reserve(
            &self,
            requester_id: RequesterId,
            display_name: &str,
            now: DateTime<Local>,
            _admit: &mut dyn FnMut(&UsageRecord) -> bool,
        ) -> StoreResult<Reservation> {
            self.get(requester_id)?;
            self.upsert_on_allow(requester_id, display_name, now)?;
            Ok(Reservation::Recorded { previous: None })
        }

        fn usage_stats(&self, _top_n: usize) -> StoreResult<UsageStats> {
            Ok(UsageStats::default())
        }

        fn is_healthy(&self) -> bool {
            false
        }
    }

    #[test]
    fn unreadable_store_denies() {
        let gate = Gatekeeper::new(Arc::new(BrokenStore { fail_reads: true }));
        let verdict = gate.check_and_reserve(RequesterId::new(1), "@alice", t0());
        assert!(matches!(
            verdict,
            Verdict::Denied { reason: DenyReason::StoreUnavailable { .. }, retry_after: None }
        ));
    }

    #[test]
    fn unwritable_store_denies() {
        let gate = Gatekeeper::new(Arc::new(BrokenStore { fail_reads: false }));
        let verdict = gate.check_and_reserve(RequesterId::new(1), "@alice", t0());
        match verdict {
            Verdict::Denied { reason, .. } => assert!(reason.is_internal()),
            Verdict::Allowed => panic!("write failure must not allow"),
        }
    }
}
