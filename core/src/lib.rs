//! leadroute-core: capacity-aware round-robin lead assignment.
//!
//! A lead comes in; an active caller covering its territory comes out.
//! The engine filters callers by daily capacity, rotates a persistent
//! per-territory cursor (with a global fallback pool when no caller
//! covers the territory), and records every decision in an append-only
//! audit log. Everything is backed by SQLite.

pub mod audit;
pub mod caller;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod lead;
pub mod store;
pub mod types;
