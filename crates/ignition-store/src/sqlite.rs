//! SQLite-based store implementation

use chrono::{DateTime, Local};
use ignition_util::RequesterId;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{Reservation, StoreError, StoreResult, UsageRecord, UsageStats, UsageStore};

/// How long a writer waits on a locked database file before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_usage (
                requester_id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                last_used_at TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_usage_count ON user_usage(usage_count);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

/// Columns: requester_id, display_name, last_used_at, usage_count
fn read_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_record(
    (id, display_name, last_used_at, usage_count): (i64, String, String, i64),
) -> StoreResult<UsageRecord> {
    let last_used_at = DateTime::parse_from_rfc3339(&last_used_at)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| {
            StoreError::Serialization(format!(
                "requester {id}: bad last_used_at {last_used_at:?}: {e}"
            ))
        })?;

    let usage_count = u32::try_from(usage_count).map_err(|_| {
        StoreError::Serialization(format!("requester {id}: bad usage_count {usage_count}"))
    })?;

    Ok(UsageRecord {
        requester_id: RequesterId::new(id),
        display_name,
        last_used_at,
        usage_count,
    })
}

fn select_record(conn: &Connection, requester_id: RequesterId) -> StoreResult<Option<UsageRecord>> {
    let row = conn
        .query_row(
            r#"
            SELECT requester_id, display_name, last_used_at, usage_count
            FROM user_usage WHERE requester_id = ?
            "#,
            [requester_id.as_i64()],
            read_row,
        )
        .optional()?;

    row.map(into_record).transpose()
}

fn record_start(
    conn: &Connection,
    requester_id: RequesterId,
    display_name: &str,
    now: DateTime<Local>,
) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO user_usage (requester_id, display_name, last_used_at, usage_count)
        VALUES (?, ?, ?, 1)
        ON CONFLICT(requester_id)
        DO UPDATE SET
            display_name = excluded.display_name,
            last_used_at = excluded.last_used_at,
            usage_count = usage_count + 1
        "#,
        params![requester_id.as_i64(), display_name, now.to_rfc3339()],
    )?;

    debug!(requester_id = %requester_id, at = %now, "Usage recorded");
    Ok(())
}

impl UsageStore for SqliteStore {
    fn get(&self, requester_id: RequesterId) -> StoreResult<Option<UsageRecord>> {
        let conn = self.conn()?;
        select_record(&conn, requester_id)
    }

    fn upsert_on_allow(
        &self,
        requester_id: RequesterId,
        display_name: &str,
        now: DateTime<Local>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        record_start(&conn, requester_id, display_name, now)
    }

    fn reserve(
        &self,
        requester_id: RequesterId,
        display_name: &str,
        now: DateTime<Local>,
        admit: &mut dyn FnMut(&UsageRecord) -> bool,
    ) -> StoreResult<Reservation> {
        let mut conn = self.conn()?;

        // IMMEDIATE takes the write lock up front, so other connections wait
        // in BEGIN instead of reading the row we are about to change.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = match select_record(&tx, requester_id)? {
            Some(record) if !admit(&record) => {
                // Dropping the transaction rolls it back.
                return Ok(Reservation::Refused(record));
            }
            previous => previous,
        };

        record_start(&tx, requester_id, display_name, now)?;
        tx.commit()?;

        Ok(Reservation::Recorded { previous })
    }

    fn usage_stats(&self, top_n: usize) -> StoreResult<UsageStats> {
        let conn = self.conn()?;

        let (total_requesters, total_starts): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(usage_count), 0) FROM user_usage",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT requester_id, display_name, last_used_at, usage_count
            FROM user_usage
            ORDER BY usage_count DESC, last_used_at DESC
            LIMIT ?
            "#,
        )?;

        let limit = i64::try_from(top_n).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], read_row)?;

        let mut top = Vec::new();
        for row in rows {
            top.push(into_record(row?)?);
        }

        Ok(UsageStats {
            total_requesters: total_requesters.max(0) as u64,
            total_starts: total_starts.max(0) as u64,
            top,
        })
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
