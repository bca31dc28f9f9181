//! Router configuration.
//!
//! Tunables that shape routing policy without touching the algorithm:
//! the capacity default applied to callers registered without an explicit
//! limit, the intake phone validation floor, and the cursor strategy
//! override. Everything has a sensible default so `RouterConfig::default()`
//! is a complete, working configuration.

use serde::{Deserialize, Serialize};

use crate::error::RouterResult;

/// How the round-robin cursor implementation is selected when the
/// engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorModeSetting {
    /// Probe the storage layer and use the atomic cursor when it is
    /// supported, the degraded cursor otherwise.
    #[default]
    Auto,
    /// Always use the atomic single-statement cursor. Fails at build
    /// time if the storage layer cannot support it.
    ForceAtomic,
    /// Always use the read-then-write cursor. Intended for exercising
    /// the fallback path in tests, not for production use.
    ForceDegraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Daily assignment cap applied when a caller is registered without
    /// an explicit limit.
    pub default_daily_limit: u32,
    /// Minimum number of digit characters a lead phone must contain to
    /// pass intake validation.
    pub min_phone_digits: usize,
    /// Role label applied when a caller is registered without one.
    pub default_role: String,
    pub cursor_mode: CursorModeSetting,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            default_daily_limit: 60,
            min_phone_digits: 10,
            default_role: "Sales Caller".to_string(),
            cursor_mode: CursorModeSetting::Auto,
        }
    }
}

impl RouterConfig {
    /// Load from a JSON file. Missing fields fall back to defaults, so a
    /// partial override file like `{"default_daily_limit": 25}` is valid.
    pub fn from_json_file(path: &str) -> RouterResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: RouterConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = RouterConfig::default();
        assert_eq!(config.default_daily_limit, 60);
        assert_eq!(config.min_phone_digits, 10);
        assert_eq!(config.default_role, "Sales Caller");
        assert_eq!(config.cursor_mode, CursorModeSetting::Auto);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config: RouterConfig =
            serde_json::from_str(r#"{"default_daily_limit": 25}"#).unwrap();
        assert_eq!(config.default_daily_limit, 25);
        assert_eq!(config.min_phone_digits, 10);
        assert_eq!(config.cursor_mode, CursorModeSetting::Auto);
    }

    #[test]
    fn cursor_mode_parses_snake_case() {
        let config: RouterConfig =
            serde_json::from_str(r#"{"cursor_mode": "force_degraded"}"#).unwrap();
        assert_eq!(config.cursor_mode, CursorModeSetting::ForceDegraded);
    }
}
