//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine and tools call store methods; they never execute SQL directly.

use chrono::{DateTime, Utc};

use crate::audit::AssignMethod;
use crate::error::RouterResult;
use crate::types::{fmt_day, fmt_timestamp, CallerId, Day, LeadId};
mod caller;
mod lead;
mod routing;
use rusqlite::{params, Connection};

pub struct RouterStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl RouterStore {
    pub fn open(path: &str) -> RouterResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        // Concurrent routers wait for a locked database instead of failing
        // immediately with SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RouterResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Open a second connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> RouterResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RouterResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_callers.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_leads.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_routing.sql"))?;
        Ok(())
    }

    // ── Commit units ───────────────────────────────────────────

    /// Assign `lead_id` to `caller_id`: lead update, counter upsert and
    /// audit insert in one transaction, in that order. Returns the
    /// assignment timestamp written to the lead.
    pub fn commit_assignment(
        &self,
        lead_id: &LeadId,
        caller_id: &CallerId,
        day: Day,
        method: AssignMethod,
        note: &str,
    ) -> RouterResult<DateTime<Utc>> {
        let now = Utc::now();
        let ts = fmt_timestamp(now);
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE lead SET status = 'assigned', assigned_to = ?1, assigned_at = ?2
             WHERE lead_id = ?3",
            params![caller_id, ts, lead_id],
        )?;
        tx.execute(
            "INSERT INTO daily_counter (caller_id, day, assigned_count) VALUES (?1, ?2, 1)
             ON CONFLICT(caller_id, day)
             DO UPDATE SET assigned_count = daily_counter.assigned_count + 1",
            params![caller_id, fmt_day(day)],
        )?;
        tx.execute(
            "INSERT INTO assignment_log (lead_id, caller_id, method, note, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![lead_id, caller_id, method.as_str(), note, ts],
        )?;
        tx.commit()?;
        Ok(now)
    }

    /// Mark `lead_id` unassigned with `reason`: lead update and audit
    /// insert in one transaction. No counter is touched.
    pub fn commit_unassigned(&self, lead_id: &LeadId, reason: &str) -> RouterResult<()> {
        let ts = fmt_timestamp(Utc::now());
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE lead SET status = 'unassigned', unassigned_reason = ?1
             WHERE lead_id = ?2",
            params![reason, lead_id],
        )?;
        tx.execute(
            "INSERT INTO assignment_log (lead_id, caller_id, method, note, logged_at)
             VALUES (?1, NULL, ?2, ?3, ?4)",
            params![
                lead_id,
                AssignMethod::Unassigned.as_str(),
                format!("Unassigned reason: {reason}"),
                ts
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}
