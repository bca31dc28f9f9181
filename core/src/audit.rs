//! The assignment audit log: an append-only record of every routing decision.
//!
//! RULE: The engine only ever inserts here. Reads are for operators and
//! tooling; no routing decision may depend on log contents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CallerId, LeadId};

/// How a lead got its caller (or why it didn't get one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignMethod {
    /// Territory-scoped round robin (tier 1).
    StateRr,
    /// Global-fallback round robin (tier 2).
    GlobalRr,
    /// Supervisor override, no capacity check.
    Manual,
    /// No eligible caller remained; lead marked unassigned.
    Unassigned,
}

impl AssignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateRr => "state_rr",
            Self::GlobalRr => "global_rr",
            Self::Manual => "manual",
            Self::Unassigned => "unassigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "state_rr" => Some(Self::StateRr),
            "global_rr" => Some(Self::GlobalRr),
            "manual" => Some(Self::Manual),
            "unassigned" => Some(Self::Unassigned),
            _ => None,
        }
    }
}

impl fmt::Display for AssignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record. `id` is the database rowid, None until
/// inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentLogEntry {
    pub id: Option<i64>,
    pub lead_id: LeadId,
    pub caller_id: Option<CallerId>,
    pub method: AssignMethod,
    pub note: String,
    pub logged_at: DateTime<Utc>,
}
