//! Round-robin cursor strategies.
//!
//! The rotation position for each partition lives in the `rr_cursor`
//! table. Advancing it is the one spot where concurrent assigners
//! collide, so the advance exists in two implementations behind one
//! trait: an atomic single-statement upsert (needs `RETURNING`, SQLite
//! 3.35+) and a read-then-write fallback that can hand two racing
//! assigners the same position. Both return the position claimed BEFORE
//! the advance, so a fresh partition starts at 0.
//!
//! RULES:
//! - Strategy selection is capability detection, never error catching.
//! - Every degraded advance logs a warning naming the partition.
//! - The atomic path retries a busy/locked error once, then degrades
//!   for that single advance (also with a warning).

use crate::config::CursorModeSetting;
use crate::error::RouterResult;
use crate::store::RouterStore;

/// Partition key used when a lead is routed through the global fallback
/// pool instead of a territory pool.
pub const GLOBAL_PARTITION_KEY: &str = "__global__";

/// SQLite gained `RETURNING` in 3.35.0.
const RETURNING_MIN_VERSION: i32 = 3_035_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// Single-statement upsert with `RETURNING`.
    Atomic,
    /// Read current position, write back position + 1. Race-prone.
    Degraded,
}

impl CursorMode {
    /// Pick the strongest mode the linked SQLite supports.
    pub fn detect() -> CursorMode {
        if rusqlite::version_number() >= RETURNING_MIN_VERSION {
            CursorMode::Atomic
        } else {
            CursorMode::Degraded
        }
    }
}

/// Resolve a configured cursor setting into a concrete mode.
/// `ForceAtomic` on a pre-3.35 SQLite is a build error, not a silent
/// downgrade.
pub fn resolve_mode(setting: CursorModeSetting) -> RouterResult<CursorMode> {
    match setting {
        CursorModeSetting::Auto => Ok(CursorMode::detect()),
        CursorModeSetting::ForceAtomic => {
            if rusqlite::version_number() >= RETURNING_MIN_VERSION {
                Ok(CursorMode::Atomic)
            } else {
                Err(anyhow::anyhow!(
                    "atomic cursor forced but SQLite {} lacks RETURNING (needs 3.35.0+)",
                    rusqlite::version()
                )
                .into())
            }
        }
        CursorModeSetting::ForceDegraded => Ok(CursorMode::Degraded),
    }
}

/// One round-robin advance strategy. Implementations are stateless; the
/// position itself always lives in the store.
pub trait RoundRobinCursor: Send {
    fn mode(&self) -> CursorMode;

    /// Claim the next position for `partition_key` and advance the
    /// stored cursor by one. Returns the claimed position.
    fn next_index(&self, store: &RouterStore, partition_key: &str) -> RouterResult<u64>;
}

pub fn cursor_for_mode(mode: CursorMode) -> Box<dyn RoundRobinCursor> {
    match mode {
        CursorMode::Atomic => Box::new(AtomicCursor),
        CursorMode::Degraded => Box::new(DegradedCursor),
    }
}

// ── Atomic ─────────────────────────────────────────────────────────────

pub struct AtomicCursor;

impl RoundRobinCursor for AtomicCursor {
    fn mode(&self) -> CursorMode {
        CursorMode::Atomic
    }

    fn next_index(&self, store: &RouterStore, partition_key: &str) -> RouterResult<u64> {
        match store.advance_cursor(partition_key) {
            Ok(index) => Ok(index),
            Err(first) if first.is_transient() => match store.advance_cursor(partition_key) {
                Ok(index) => Ok(index),
                Err(second) if second.is_transient() => {
                    log::warn!(
                        "atomic cursor advance for '{partition_key}' still busy after retry \
                         ({second}); using read-then-write for this advance"
                    );
                    degraded_advance(store, partition_key)
                }
                Err(second) => Err(second),
            },
            Err(first) => Err(first),
        }
    }
}

// ── Degraded ───────────────────────────────────────────────────────────

pub struct DegradedCursor;

impl RoundRobinCursor for DegradedCursor {
    fn mode(&self) -> CursorMode {
        CursorMode::Degraded
    }

    fn next_index(&self, store: &RouterStore, partition_key: &str) -> RouterResult<u64> {
        log::warn!(
            "degraded cursor advance for '{partition_key}': concurrent assigners \
             may claim the same position"
        );
        degraded_advance(store, partition_key)
    }
}

/// Read the current position, then write back position + 1 as a second
/// statement. A missing row reads as 0, matching the atomic path's
/// behavior on a fresh partition.
fn degraded_advance(store: &RouterStore, partition_key: &str) -> RouterResult<u64> {
    let current = store.read_cursor(partition_key)?.unwrap_or(0);
    store.write_cursor(partition_key, current + 1)?;
    Ok(current)
}
