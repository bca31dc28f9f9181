//! Lead records: inbound requests for contact.
//!
//! A lead arrives with status `new`, and the assignment engine moves it to
//! exactly one of `assigned` | `unassigned`. `new` is transient: it only
//! survives if the engine was never invoked for the lead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CallerId, LeadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Assigned,
    Unassigned,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "assigned" => Some(Self::Assigned),
            "unassigned" => Some(Self::Unassigned),
            _ => None,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    /// Natural dedup key, backed by a UNIQUE index.
    pub phone: String,
    pub email: Option<String>,
    pub city: Option<String>,
    pub territory: String,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub assigned_to: Option<CallerId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub unassigned_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Intake payload for a new lead. The engine fills in the identifier,
/// status and creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    #[serde(default)]
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub territory: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Filter for lead listings. All fields optional; `limit` defaults to 50.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub territory: Option<String>,
    pub limit: Option<usize>,
}

/// Count of ASCII digits in a phone string. Intake rejects phones with
/// fewer digits than the configured minimum.
pub fn phone_digits(phone: &str) -> usize {
    phone.chars().filter(|c| c.is_ascii_digit()).count()
}
