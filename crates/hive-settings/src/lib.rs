//! # hive-settings
//!
//! Configuration management with layered sources for the hive daemon.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`HiveSettings::default()`]
//! 2. **User file** — `~/.hive/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `HIVE_*` overrides (highest priority)
//!
//! There's no process-global settings cell here: `hive-server` loads a
//! [`HiveSettings`] once at startup and passes it into `SwarmManagerConfig`
//! by value, and every unit test builds its own instance with its own
//! `data_dir`. A `OnceLock` singleton would force every test in the
//! process to share whichever settings happened to win the race to
//! initialize it first.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = HiveSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn deep_merge_re_exported() {
        let a = serde_json::json!({"x": 1});
        let b = serde_json::json!({"y": 2});
        let merged = deep_merge(a, b);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = HiveSettings::default();
        assert_eq!(settings.name, "hive");
        assert_eq!(settings.daemon.health_port, 8081);
        assert_eq!(settings.swarm.default_model.provider, "anthropic");
        assert_eq!(settings.runtime.max_restart_attempts, 3);
        assert_eq!(settings.cron.default_timezone, "UTC");
        assert_eq!(settings.logging.level, "info");
    }
}
