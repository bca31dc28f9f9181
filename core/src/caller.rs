//! Caller records: the human agents leads are routed to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CallerId;

/// An agent eligible to receive leads.
///
/// A caller with `daily_limit` 0 is never selected by the automatic path:
/// the capacity filter removes it from every pool. Deactivation is soft
/// (`active` flag) so historical assignments keep a valid reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    pub id: CallerId,
    pub name: String,
    pub role: String,
    pub phone: String,
    pub languages: Vec<String>,
    /// Territory labels this caller serves. Tier-1 eligibility is
    /// membership of the lead's territory in this set.
    pub territories: Vec<String>,
    pub daily_limit: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for registering a caller. The engine fills in the identifier,
/// active flag and creation timestamp; `role` and `daily_limit` fall back
/// to the configured defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCaller {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub territories: Vec<String>,
    #[serde(default)]
    pub daily_limit: Option<u32>,
}

/// Partial update for admin edits. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallerPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub territories: Option<Vec<String>>,
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// A caller joined with its assignment count for one day. This is the
/// dashboard view: directory row plus "how many today".
#[derive(Debug, Clone, Serialize)]
pub struct CallerWithCount {
    #[serde(flatten)]
    pub caller: Caller,
    pub today_count: u32,
}
