//! The assignment engine: the routing brain of the lead router.
//!
//! ALGORITHM (fixed, documented, never reordered):
//!   1. Pool: active callers covering the lead's territory.
//!   2. Fallback: empty pool widens to every active caller.
//!   3. Capacity: drop callers at or over today's limit.
//!   4. Exhaustion: empty eligible set marks the lead unassigned.
//!   5. Order: sort eligible callers by id.
//!   6. Rotate: advance the partition's cursor, select position % len.
//!   7. Commit: lead + counter + audit in one unit of work.
//!
//! RULES:
//!   - One engine owns one store connection and one cursor strategy.
//!   - A lead is routed at most once: only status `new` is routable.
//!   - Capacity binds the automatic path only; manual overrides skip it.
//!   - The engine writes the audit log but never reads it.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::AssignMethod,
    caller::{Caller, NewCaller},
    config::RouterConfig,
    cursor::{cursor_for_mode, resolve_mode, RoundRobinCursor, GLOBAL_PARTITION_KEY},
    error::{RouterError, RouterResult},
    lead::{phone_digits, Lead, LeadStatus, NewLead},
    store::RouterStore,
    types::{today_utc, CallerId, Day, LeadId},
};

/// Reason recorded when no eligible caller remains for a lead.
pub const REASON_CAPS_FULL: &str = "caps_full";

/// What `assign` decided for one lead.
#[derive(Debug, Clone)]
pub enum AssignOutcome {
    Assigned {
        caller: Caller,
        method: AssignMethod,
        /// Position selected in the sorted eligible pool.
        index: usize,
    },
    Unassigned {
        reason: String,
    },
}

impl AssignOutcome {
    pub fn assigned(&self) -> bool {
        matches!(self, AssignOutcome::Assigned { .. })
    }

    pub fn caller(&self) -> Option<&Caller> {
        match self {
            AssignOutcome::Assigned { caller, .. } => Some(caller),
            AssignOutcome::Unassigned { .. } => None,
        }
    }
}

/// What `intake` did with an inbound lead payload.
#[derive(Debug, Clone)]
pub enum IntakeOutcome {
    /// Lead persisted and routed.
    Routed { lead: Lead, outcome: AssignOutcome },
    /// A lead with this phone already exists; nothing was written.
    Duplicate { existing: Lead },
}

pub struct AssignmentEngine {
    store: RouterStore,
    cursor: Box<dyn RoundRobinCursor>,
    config: RouterConfig,
}

impl AssignmentEngine {
    pub fn new(store: RouterStore, cursor: Box<dyn RoundRobinCursor>, config: RouterConfig) -> Self {
        Self {
            store,
            cursor,
            config,
        }
    }

    /// Build a fully wired engine: the cursor strategy is resolved from
    /// the configuration (capability-detected under `Auto`).
    pub fn build(store: RouterStore, config: RouterConfig) -> RouterResult<Self> {
        let mode = resolve_mode(config.cursor_mode)?;
        log::info!("assignment engine using {mode:?} cursor");
        Ok(Self {
            store,
            cursor: cursor_for_mode(mode),
            config,
        })
    }

    pub fn store(&self) -> &RouterStore {
        &self.store
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    // ── Caller registration ────────────────────────────────────

    /// Register a caller, filling role and daily limit from the
    /// configured defaults when the payload omits them.
    pub fn register_caller(&self, new: NewCaller) -> RouterResult<Caller> {
        let caller = Caller {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            role: new
                .role
                .unwrap_or_else(|| self.config.default_role.clone()),
            phone: new.phone,
            languages: new.languages,
            territories: new.territories,
            daily_limit: new.daily_limit.unwrap_or(self.config.default_daily_limit),
            active: true,
            created_at: Utc::now(),
        };
        self.store.insert_caller(&caller)?;
        log::info!("registered caller {} ({})", caller.id, caller.name);
        Ok(caller)
    }

    // ── Automatic assignment ───────────────────────────────────

    /// Route a lead to a caller, or mark it unassigned when every
    /// eligible caller is at capacity.
    ///
    /// The persisted status is re-read first: anything but `new` is
    /// rejected with `LeadNotRoutable`, so re-delivered webhooks and
    /// double-fired crons cannot route the same lead twice.
    pub fn assign(&self, lead: &Lead) -> RouterResult<AssignOutcome> {
        let persisted = self
            .store
            .get_lead(&lead.id)?
            .ok_or_else(|| RouterError::LeadNotFound {
                lead_id: lead.id.clone(),
            })?;
        if persisted.status != LeadStatus::New {
            return Err(RouterError::LeadNotRoutable {
                lead_id: persisted.id,
                status: persisted.status,
            });
        }

        let today = today_utc();

        // Tier 1: active callers covering the territory.
        let mut pool = self
            .store
            .active_callers_for_territory(&persisted.territory)?;
        let mut fallback = false;

        // Tier 2: no territory coverage widens to every active caller.
        if pool.is_empty() {
            fallback = true;
            pool = self.store.active_callers()?;
        }

        // Capacity filter: a missing counter row counts as 0. Counts are
        // a snapshot, so assigners racing the same caller may each see
        // the last free slot; the overshoot is bounded by the racers in
        // flight. An empty pool falls straight through to the exhaustion
        // branch.
        let ids: Vec<CallerId> = pool.iter().map(|c| c.id.clone()).collect();
        let counts = self.store.today_counts(&ids, today)?;
        let mut eligible: Vec<Caller> = pool
            .into_iter()
            .filter(|c| counts.get(&c.id).copied().unwrap_or(0) < c.daily_limit)
            .collect();

        if eligible.is_empty() {
            log::info!(
                "lead {} unassigned: no eligible caller for territory '{}'",
                persisted.id,
                persisted.territory
            );
            self.store.commit_unassigned(&persisted.id, REASON_CAPS_FULL)?;
            return Ok(AssignOutcome::Unassigned {
                reason: REASON_CAPS_FULL.to_string(),
            });
        }

        // Deterministic rotation order.
        eligible.sort_by(|a, b| a.id.cmp(&b.id));

        let partition_key = if fallback {
            GLOBAL_PARTITION_KEY
        } else {
            persisted.territory.as_str()
        };
        let position = self.cursor.next_index(&self.store, partition_key)?;
        let index = (position as usize) % eligible.len();
        let caller = eligible.swap_remove(index);

        let method = if fallback {
            AssignMethod::GlobalRr
        } else {
            AssignMethod::StateRr
        };
        self.store.commit_assignment(
            &persisted.id,
            &caller.id,
            today,
            method,
            &format!("Assigned index {index}"),
        )?;
        log::debug!(
            "lead {} -> caller {} via {method} (position {position}, index {index})",
            persisted.id,
            caller.id
        );
        Ok(AssignOutcome::Assigned {
            caller,
            method,
            index,
        })
    }

    // ── Supervisor operations ──────────────────────────────────

    /// Manual override: set the lead's caller directly. No capacity
    /// check, no cursor involvement. Every call appends a log entry and
    /// increments the day's counter, so repeating it inflates the count.
    pub fn reassign(&self, lead_id: &LeadId, caller_id: &CallerId) -> RouterResult<()> {
        let lead = self
            .store
            .get_lead(lead_id)?
            .ok_or_else(|| RouterError::LeadNotFound {
                lead_id: lead_id.clone(),
            })?;
        let caller = self
            .store
            .get_caller(caller_id)?
            .ok_or_else(|| RouterError::CallerNotFound {
                caller_id: caller_id.clone(),
            })?;
        self.store.commit_assignment(
            &lead.id,
            &caller.id,
            today_utc(),
            AssignMethod::Manual,
            "Manual reassignment",
        )?;
        log::info!("lead {} manually reassigned to {}", lead.id, caller.id);
        Ok(())
    }

    /// Mark a lead unassigned with an operator-supplied reason.
    pub fn mark_unassigned(&self, lead_id: &LeadId, reason: &str) -> RouterResult<()> {
        let lead = self
            .store
            .get_lead(lead_id)?
            .ok_or_else(|| RouterError::LeadNotFound {
                lead_id: lead_id.clone(),
            })?;
        self.store.commit_unassigned(&lead.id, reason)?;
        Ok(())
    }

    // ── Maintenance ────────────────────────────────────────────

    /// Drop capacity counters for days strictly before `day`. Advisory
    /// housekeeping: eligibility only ever reads today's counters.
    pub fn purge_counters_before(&self, day: Day) -> RouterResult<usize> {
        let removed = self.store.purge_counters_before(day)?;
        if removed > 0 {
            log::info!("purged {removed} stale daily counters");
        }
        Ok(removed)
    }

    // ── Intake ─────────────────────────────────────────────────

    /// Persist an inbound lead and immediately route it.
    ///
    /// Dedup is phone-based. The pre-check catches the common case; the
    /// UNIQUE index on phone catches two intakes racing the same phone,
    /// and the loser resolves the winner's lead as its duplicate.
    pub fn intake(&self, new: NewLead) -> RouterResult<IntakeOutcome> {
        if phone_digits(&new.phone) < self.config.min_phone_digits {
            return Err(RouterError::InvalidPhone {
                phone: new.phone,
                min_digits: self.config.min_phone_digits,
            });
        }
        if let Some(existing) = self.store.find_lead_by_phone(&new.phone)? {
            log::debug!("intake: phone already known on lead {}", existing.id);
            return Ok(IntakeOutcome::Duplicate { existing });
        }

        let lead = Lead {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            phone: new.phone,
            email: new.email,
            city: new.city,
            territory: new.territory,
            source: new.source,
            status: LeadStatus::New,
            assigned_to: None,
            assigned_at: None,
            unassigned_reason: None,
            created_at: Utc::now(),
        };
        match self.store.insert_lead(&lead) {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                let existing = self
                    .store
                    .find_lead_by_phone(&lead.phone)?
                    .ok_or_else(|| {
                        anyhow::anyhow!("phone {} unique-collided but no lead found", lead.phone)
                    })?;
                log::debug!("intake: lost phone race to lead {}", existing.id);
                return Ok(IntakeOutcome::Duplicate { existing });
            }
            Err(e) => return Err(e),
        }
        log::info!(
            "intake: lead {} for territory '{}'",
            lead.id,
            lead.territory
        );
        let outcome = self.assign(&lead)?;
        Ok(IntakeOutcome::Routed { lead, outcome })
    }
}
