//! Lead table queries.

use super::RouterStore;
use crate::error::RouterResult;
use crate::lead::{Lead, LeadFilter, LeadStatus};
use crate::types::{fmt_timestamp, parse_timestamp};
use rusqlite::{params, OptionalExtension, ToSql};

struct LeadRow {
    id: String,
    name: String,
    phone: String,
    email: Option<String>,
    city: Option<String>,
    territory: String,
    source: Option<String>,
    status: String,
    assigned_to: Option<String>,
    assigned_at: Option<String>,
    unassigned_reason: Option<String>,
    created_at: String,
}

fn lead_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<LeadRow> {
    Ok(LeadRow {
        id: r.get(0)?,
        name: r.get(1)?,
        phone: r.get(2)?,
        email: r.get(3)?,
        city: r.get(4)?,
        territory: r.get(5)?,
        source: r.get(6)?,
        status: r.get(7)?,
        assigned_to: r.get(8)?,
        assigned_at: r.get(9)?,
        unassigned_reason: r.get(10)?,
        created_at: r.get(11)?,
    })
}

impl LeadRow {
    fn into_lead(self) -> RouterResult<Lead> {
        let status = LeadStatus::parse(&self.status).ok_or_else(|| {
            anyhow::anyhow!("Unknown lead status '{}' on lead {}", self.status, self.id)
        })?;
        let assigned_at = match self.assigned_at {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        };
        Ok(Lead {
            id: self.id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            city: self.city,
            territory: self.territory,
            source: self.source,
            status,
            assigned_to: self.assigned_to,
            assigned_at,
            unassigned_reason: self.unassigned_reason,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl RouterStore {
    /// Insert a fully built lead. A phone collision surfaces as a UNIQUE
    /// constraint violation; intake translates it into a duplicate
    /// outcome instead of an error.
    pub fn insert_lead(&self, lead: &Lead) -> RouterResult<()> {
        self.conn.execute(
            "INSERT INTO lead (lead_id, name, phone, email, city, territory, source,
                status, assigned_to, assigned_at, unassigned_reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &lead.id,
                &lead.name,
                &lead.phone,
                &lead.email,
                &lead.city,
                &lead.territory,
                &lead.source,
                lead.status.as_str(),
                &lead.assigned_to,
                lead.assigned_at.map(fmt_timestamp),
                &lead.unassigned_reason,
                fmt_timestamp(lead.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_lead(&self, lead_id: &str) -> RouterResult<Option<Lead>> {
        let row = self
            .conn
            .query_row(
                "SELECT lead_id, name, phone, email, city, territory, source, status,
                        assigned_to, assigned_at, unassigned_reason, created_at
                 FROM lead WHERE lead_id = ?1",
                params![lead_id],
                lead_row,
            )
            .optional()?;
        match row {
            Some(r) => Ok(Some(r.into_lead()?)),
            None => Ok(None),
        }
    }

    pub fn find_lead_by_phone(&self, phone: &str) -> RouterResult<Option<Lead>> {
        let row = self
            .conn
            .query_row(
                "SELECT lead_id, name, phone, email, city, territory, source, status,
                        assigned_to, assigned_at, unassigned_reason, created_at
                 FROM lead WHERE phone = ?1",
                params![phone],
                lead_row,
            )
            .optional()?;
        match row {
            Some(r) => Ok(Some(r.into_lead()?)),
            None => Ok(None),
        }
    }

    /// Filtered listing, newest first. `limit` defaults to 50.
    pub fn list_leads(&self, filter: &LeadFilter) -> RouterResult<Vec<Lead>> {
        let mut sql = String::from(
            "SELECT lead_id, name, phone, email, city, territory, source, status,
                    assigned_to, assigned_at, unassigned_reason, created_at
             FROM lead",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(status) = filter.status {
            args.push(Box::new(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(territory) = &filter.territory {
            args.push(Box::new(territory.clone()));
            clauses.push(format!("territory = ?{}", args.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC");
        args.push(Box::new(filter.limit.unwrap_or(50) as i64));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let arg_refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt.query_map(arg_refs.as_slice(), lead_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_lead()?);
        }
        Ok(result)
    }
}
