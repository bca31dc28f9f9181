//! Round-robin cursor rows, daily capacity counters and the audit log.

use std::collections::HashMap;

use super::RouterStore;
use crate::audit::{AssignMethod, AssignmentLogEntry};
use crate::error::RouterResult;
use crate::types::{fmt_day, parse_timestamp, CallerId, Day};
use rusqlite::{params, OptionalExtension, ToSql};

struct LogRow {
    id: i64,
    lead_id: String,
    caller_id: Option<String>,
    method: String,
    note: String,
    logged_at: String,
}

fn log_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<LogRow> {
    Ok(LogRow {
        id: r.get(0)?,
        lead_id: r.get(1)?,
        caller_id: r.get(2)?,
        method: r.get(3)?,
        note: r.get(4)?,
        logged_at: r.get(5)?,
    })
}

impl LogRow {
    fn into_entry(self) -> RouterResult<AssignmentLogEntry> {
        let method = AssignMethod::parse(&self.method).ok_or_else(|| {
            anyhow::anyhow!("Unknown method '{}' on log entry {}", self.method, self.id)
        })?;
        Ok(AssignmentLogEntry {
            id: Some(self.id),
            lead_id: self.lead_id,
            caller_id: self.caller_id,
            method,
            note: self.note,
            logged_at: parse_timestamp(&self.logged_at)?,
        })
    }
}

impl RouterStore {
    // ── Round-robin cursor ─────────────────────────────────────

    /// Claim and advance the cursor for `partition_key` in a single
    /// statement. Returns the pre-increment position, so the first
    /// advance on a fresh partition yields 0.
    ///
    /// Needs `RETURNING` (SQLite 3.35+); the cursor strategy layer only
    /// calls this when capability detection allows it.
    pub fn advance_cursor(&self, partition_key: &str) -> RouterResult<u64> {
        let next: i64 = self.conn.query_row(
            "INSERT INTO rr_cursor (partition_key, position) VALUES (?1, 1)
             ON CONFLICT(partition_key) DO UPDATE SET position = rr_cursor.position + 1
             RETURNING position",
            params![partition_key],
            |r| r.get(0),
        )?;
        Ok((next - 1) as u64)
    }

    pub fn read_cursor(&self, partition_key: &str) -> RouterResult<Option<u64>> {
        let position: Option<i64> = self
            .conn
            .query_row(
                "SELECT position FROM rr_cursor WHERE partition_key = ?1",
                params![partition_key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(position.map(|p| p as u64))
    }

    pub fn write_cursor(&self, partition_key: &str, position: u64) -> RouterResult<()> {
        self.conn.execute(
            "INSERT INTO rr_cursor (partition_key, position) VALUES (?1, ?2)
             ON CONFLICT(partition_key) DO UPDATE SET position = excluded.position",
            params![partition_key, position as i64],
        )?;
        Ok(())
    }

    // ── Daily counters ─────────────────────────────────────────

    /// Create the counter at 1 or increment it, one statement.
    pub fn bump_daily_counter(&self, caller_id: &str, day: Day) -> RouterResult<()> {
        self.conn.execute(
            "INSERT INTO daily_counter (caller_id, day, assigned_count) VALUES (?1, ?2, 1)
             ON CONFLICT(caller_id, day)
             DO UPDATE SET assigned_count = daily_counter.assigned_count + 1",
            params![caller_id, fmt_day(day)],
        )?;
        Ok(())
    }

    pub fn counter_for(&self, caller_id: &str, day: Day) -> RouterResult<Option<u32>> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT assigned_count FROM daily_counter WHERE caller_id = ?1 AND day = ?2",
                params![caller_id, fmt_day(day)],
                |r| r.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c as u32))
    }

    /// Counters for a caller set on one day. Callers with no counter row
    /// are simply absent from the map; the engine reads that as 0.
    pub fn today_counts(
        &self,
        caller_ids: &[CallerId],
        day: Day,
    ) -> RouterResult<HashMap<CallerId, u32>> {
        let mut counts = HashMap::new();
        if caller_ids.is_empty() {
            return Ok(counts);
        }
        let placeholders = (0..caller_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT caller_id, assigned_count FROM daily_counter
             WHERE day = ?1 AND caller_id IN ({placeholders})"
        );
        let day_text = fmt_day(day);
        let mut args: Vec<&dyn ToSql> = Vec::with_capacity(caller_ids.len() + 1);
        args.push(&day_text);
        for id in caller_ids {
            args.push(id);
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args.as_slice(), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u32))
        })?;
        for row in rows {
            let (caller_id, count) = row?;
            counts.insert(caller_id, count);
        }
        Ok(counts)
    }

    /// Delete counters for days strictly before `day`. Idempotent.
    /// Returns the number of rows removed.
    pub fn purge_counters_before(&self, day: Day) -> RouterResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM daily_counter WHERE day < ?1",
            params![fmt_day(day)],
        )?;
        Ok(removed)
    }

    // ── Audit log ──────────────────────────────────────────────

    /// Latest entries, newest first.
    pub fn recent_assignment_logs(&self, limit: usize) -> RouterResult<Vec<AssignmentLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lead_id, caller_id, method, note, logged_at
             FROM assignment_log
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], log_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_entry()?);
        }
        Ok(result)
    }

    /// Full history for one lead, oldest first.
    pub fn logs_for_lead(&self, lead_id: &str) -> RouterResult<Vec<AssignmentLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lead_id, caller_id, method, note, logged_at
             FROM assignment_log
             WHERE lead_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![lead_id], log_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_entry()?);
        }
        Ok(result)
    }
}
