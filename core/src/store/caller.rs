//! Caller directory queries.

use super::RouterStore;
use crate::caller::{Caller, CallerPatch, CallerWithCount};
use crate::error::{RouterError, RouterResult};
use crate::types::{fmt_day, fmt_timestamp, parse_timestamp, Day};
use rusqlite::{params, OptionalExtension};

/// Raw caller row. JSON columns and the timestamp stay as TEXT until
/// `into_caller` converts them, so row mapping never fails on anything
/// but SQL type mismatches.
struct CallerRow {
    id: String,
    name: String,
    role: String,
    phone: String,
    languages: String,
    territories: String,
    daily_limit: i64,
    active: bool,
    created_at: String,
}

fn caller_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<CallerRow> {
    Ok(CallerRow {
        id: r.get(0)?,
        name: r.get(1)?,
        role: r.get(2)?,
        phone: r.get(3)?,
        languages: r.get(4)?,
        territories: r.get(5)?,
        daily_limit: r.get(6)?,
        active: r.get::<_, i32>(7)? != 0,
        created_at: r.get(8)?,
    })
}

impl CallerRow {
    fn into_caller(self) -> RouterResult<Caller> {
        Ok(Caller {
            id: self.id,
            name: self.name,
            role: self.role,
            phone: self.phone,
            languages: serde_json::from_str(&self.languages)?,
            territories: serde_json::from_str(&self.territories)?,
            daily_limit: self.daily_limit as u32,
            active: self.active,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl RouterStore {
    pub fn insert_caller(&self, c: &Caller) -> RouterResult<()> {
        self.conn.execute(
            "INSERT INTO caller (caller_id, name, role, phone, languages, territories,
                daily_limit, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &c.id,
                &c.name,
                &c.role,
                &c.phone,
                serde_json::to_string(&c.languages)?,
                serde_json::to_string(&c.territories)?,
                c.daily_limit as i64,
                if c.active { 1 } else { 0 },
                fmt_timestamp(c.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_caller(&self, caller_id: &str) -> RouterResult<Option<Caller>> {
        let row = self
            .conn
            .query_row(
                "SELECT caller_id, name, role, phone, languages, territories,
                        daily_limit, active, created_at
                 FROM caller WHERE caller_id = ?1",
                params![caller_id],
                caller_row,
            )
            .optional()?;
        match row {
            Some(r) => Ok(Some(r.into_caller()?)),
            None => Ok(None),
        }
    }

    /// Active callers whose territory set contains `territory` (the
    /// tier-1 pool). Order is stable but the engine re-sorts by id.
    pub fn active_callers_for_territory(&self, territory: &str) -> RouterResult<Vec<Caller>> {
        let mut stmt = self.conn.prepare(
            "SELECT caller_id, name, role, phone, languages, territories,
                    daily_limit, active, created_at
             FROM caller c
             WHERE c.active = 1
               AND EXISTS (SELECT 1 FROM json_each(c.territories) WHERE value = ?1)
             ORDER BY caller_id",
        )?;
        let rows = stmt.query_map(params![territory], caller_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_caller()?);
        }
        Ok(result)
    }

    /// Every active caller (the tier-2 fallback pool).
    pub fn active_callers(&self) -> RouterResult<Vec<Caller>> {
        let mut stmt = self.conn.prepare(
            "SELECT caller_id, name, role, phone, languages, territories,
                    daily_limit, active, created_at
             FROM caller WHERE active = 1
             ORDER BY caller_id",
        )?;
        let rows = stmt.query_map([], caller_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_caller()?);
        }
        Ok(result)
    }

    /// Directory joined with the day's assignment counts (absent rows
    /// read as 0), newest first.
    pub fn callers_with_today_count(&self, day: Day) -> RouterResult<Vec<CallerWithCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.caller_id, c.name, c.role, c.phone, c.languages, c.territories,
                    c.daily_limit, c.active, c.created_at,
                    COALESCE(d.assigned_count, 0)
             FROM caller c
             LEFT JOIN daily_counter d ON d.caller_id = c.caller_id AND d.day = ?1
             ORDER BY c.created_at DESC",
        )?;
        let rows = stmt.query_map(params![fmt_day(day)], |r| {
            Ok((caller_row(r)?, r.get::<_, i64>(9)?))
        })?;
        let mut result = Vec::new();
        for row in rows {
            let (raw, count) = row?;
            result.push(CallerWithCount {
                caller: raw.into_caller()?,
                today_count: count as u32,
            });
        }
        Ok(result)
    }

    /// Apply a partial update. Unset patch fields keep their current
    /// value. Deactivation goes through here (`active: Some(false)`);
    /// callers are never deleted.
    pub fn update_caller(&self, caller_id: &str, patch: &CallerPatch) -> RouterResult<Caller> {
        let current = self
            .get_caller(caller_id)?
            .ok_or_else(|| RouterError::CallerNotFound {
                caller_id: caller_id.to_string(),
            })?;
        let updated = Caller {
            id: current.id,
            name: patch.name.clone().unwrap_or(current.name),
            role: patch.role.clone().unwrap_or(current.role),
            phone: patch.phone.clone().unwrap_or(current.phone),
            languages: patch.languages.clone().unwrap_or(current.languages),
            territories: patch.territories.clone().unwrap_or(current.territories),
            daily_limit: patch.daily_limit.unwrap_or(current.daily_limit),
            active: patch.active.unwrap_or(current.active),
            created_at: current.created_at,
        };
        self.conn.execute(
            "UPDATE caller SET name = ?1, role = ?2, phone = ?3, languages = ?4,
                territories = ?5, daily_limit = ?6, active = ?7
             WHERE caller_id = ?8",
            params![
                &updated.name,
                &updated.role,
                &updated.phone,
                serde_json::to_string(&updated.languages)?,
                serde_json::to_string(&updated.territories)?,
                updated.daily_limit as i64,
                if updated.active { 1 } else { 0 },
                caller_id,
            ],
        )?;
        Ok(updated)
    }
}
