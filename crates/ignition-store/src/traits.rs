//! Store trait definitions

use chrono::{DateTime, Local};
use ignition_util::RequesterId;

use crate::{Reservation, StoreResult, UsageRecord, UsageStats};

/// Durable per-requester usage table
pub trait UsageStore: Send + Sync {
    /// Fetch the record for a requester; `None` means "never used"
    fn get(&self, requester_id: RequesterId) -> StoreResult<Option<UsageRecord>>;

    /// Record an allowed start.
    ///
    /// Creates the record with `usage_count = 1` or, if it exists, bumps the
    /// counter, moves `last_used_at` to `now` and overwrites the display name.
    fn upsert_on_allow(
        &self,
        requester_id: RequesterId,
        display_name: &str,
        now: DateTime<Local>,
    ) -> StoreResult<()>;

    /// Read, decide and record in one step.
    ///
    /// `admit` sees the current record, if any, and no other writer can touch
    /// that record until the call returns, in this process or another one
    /// sharing the same database. A requester without a record is always
    /// recorded. Otherwise the start is recorded as in
    /// [`upsert_on_allow`](Self::upsert_on_allow) only when `admit` returns
    /// `true`.
    fn reserve(
        &self,
        requester_id: RequesterId,
        display_name: &str,
        now: DateTime<Local>,
        admit: &mut dyn FnMut(&UsageRecord) -> bool,
    ) -> StoreResult<Reservation>;

    /// Totals plus the `top_n` heaviest users
    fn usage_stats(&self, top_n: usize) -> StoreResult<UsageStats>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
