//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HiveSettings::default()`]
//! 2. If `~/.hive/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::HiveSettings;

/// Resolve the path to the settings file (`~/.hive/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".hive").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HiveSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<HiveSettings> {
    let defaults = serde_json::to_value(HiveSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: HiveSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values: `source` wins, keyed
/// descent only continues where both sides are objects.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    let (target, source) = match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => (target_map, source_map),
        (_, source) => return source,
    };
    let mut target = target;
    for (key, source_val) in source {
        if source_val.is_null() {
            continue;
        }
        match target.entry(key) {
            serde_json::map::Entry::Occupied(mut existing) => {
                let merged = deep_merge(existing.get().clone(), source_val);
                let _ = existing.insert(merged);
            }
            serde_json::map::Entry::Vacant(slot) => {
                let _ = slot.insert(source_val);
            }
        }
    }
    Value::Object(target)
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are silently ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut HiveSettings) {
    // ── Daemon settings ─────────────────────────────────────────────
    if let Some(v) = read_env_string("HIVE_DATA_DIR") {
        settings.daemon.data_dir = v;
    }
    if let Some(v) = read_env_string("HIVE_WORKSPACE_ROOT") {
        settings.daemon.workspace_root = v;
    }
    if let Some(v) = read_env_u16("HIVE_HEALTH_PORT", 1, 65535) {
        settings.daemon.health_port = v;
    }
    if let Some(v) = read_env_u64("HIVE_CRON_TICK_INTERVAL_MS", 100, 3_600_000) {
        settings.daemon.cron_tick_interval_ms = v;
    }

    // ── Swarm settings ──────────────────────────────────────────────
    if let Some(v) = read_env_string("HIVE_DEFAULT_PROVIDER") {
        settings.swarm.default_model.provider = v;
    }
    if let Some(v) = read_env_string("HIVE_DEFAULT_MODEL") {
        settings.swarm.default_model.model_id = v;
    }
    if let Some(v) = read_env_usize("HIVE_MAX_CONCURRENT_AGENTS", 1, 10_000) {
        settings.swarm.max_concurrent_agents = v;
    }
    if let Some(v) = read_env_usize("HIVE_CONVERSATION_RING_CAPACITY", 1, 1_000_000) {
        settings.swarm.conversation_ring_capacity = v;
    }

    // ── Runtime settings ─────────────────────────────────────────────
    if let Some(v) = read_env_string("HIVE_CHILD_BINARY_PATH") {
        settings.runtime.child_binary_path = v;
    }
    if let Some(v) = read_env_u64("HIVE_RPC_TIMEOUT_MS", 0, 3_600_000) {
        settings.runtime.rpc_timeout_ms = v;
    }
    if let Some(v) = read_env_u32("HIVE_MAX_RESTART_ATTEMPTS", 0, 100) {
        settings.runtime.max_restart_attempts = v;
    }

    // ── Cron settings ─────────────────────────────────────────────────
    if let Some(v) = read_env_string("HIVE_CRON_DEFAULT_TIMEZONE") {
        settings.cron.default_timezone = v;
    }
    if let Some(v) = read_env_u32("HIVE_CRON_MAX_CONSECUTIVE_FAILURES", 1, 1000) {
        settings.cron.max_consecutive_failures = v;
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = read_env_string("HIVE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("HIVE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a bounded number of any integer type the range checks
/// support. One generic replaces what would otherwise be a `parse_u16_range`/
/// `parse_u32_range`/`parse_u64_range`/`parse_usize_range` quartet that
/// differ only in which integer type they name.
pub fn parse_ranged<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    parse_ranged(val, min, max)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    parse_ranged(val, min, max)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    parse_ranged(val, min, max)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    parse_ranged(val, min, max)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    read_env_parsed(name, "boolean", |v| parse_bool(v))
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    read_env_parsed(name, "u16", |v| parse_ranged(v, min, max))
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    read_env_parsed(name, "u32", |v| parse_ranged(v, min, max))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    read_env_parsed(name, "u64", |v| parse_ranged(v, min, max))
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    read_env_parsed(name, "usize", |v| parse_ranged(v, min, max))
}

/// Reads `name` from the environment and applies `parse`, warning and
/// discarding the value on a parse failure rather than propagating an error.
/// An unset or malformed override should never stop the daemon from booting
/// on compiled/file defaults.
fn read_env_parsed<T>(name: &str, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let val = std::env::var(name).ok()?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": 10});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 10);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "daemon": {"healthPort": 8081, "dataDir": "/x"}
        });
        let source = serde_json::json!({
            "daemon": {"healthPort": 9090}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["daemon"]["healthPort"], 9090);
        assert_eq!(merged["daemon"]["dataDir"], "/x");
    }

    #[test]
    fn merge_deeply_nested() {
        let target = serde_json::json!({
            "a": {"b": {"c": {"d": 1, "e": 2}}}
        });
        let source = serde_json::json!({
            "a": {"b": {"c": {"d": 99}}}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"]["b"]["c"]["d"], 99);
        assert_eq!(merged["a"]["b"]["c"]["e"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"b": 2});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replace() {
        let target = serde_json::json!("hello");
        let source = serde_json::json!("world");
        let merged = deep_merge(target, source);
        assert_eq!(merged, "world");
    }

    #[test]
    fn merge_object_replaces_primitive() {
        let target = serde_json::json!({"a": "string"});
        let source = serde_json::json!({"a": {"nested": true}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"]["nested"], true);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }

    #[test]
    fn merge_empty_source() {
        let target = serde_json::json!({"a": 1, "b": {"c": 2}});
        let source = serde_json::json!({});
        let merged = deep_merge(target.clone(), source);
        assert_eq!(merged, target);
    }

    #[test]
    fn merge_empty_target() {
        let target = serde_json::json!({});
        let source = serde_json::json!({"a": 1});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = load_settings_from_path(path).unwrap();
        let defaults = HiveSettings::default();
        assert_eq!(settings.version, defaults.version);
        assert_eq!(settings.daemon.health_port, defaults.daemon.health_port);
    }

    #[test]
    fn load_empty_json_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{}").unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        let defaults = HiveSettings::default();
        assert_eq!(settings.version, defaults.version);
        assert_eq!(settings.daemon.health_port, defaults.daemon.health_port);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"daemon": {"healthPort": 9090}, "swarm": {"maxConcurrentAgents": 5}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.daemon.health_port, 9090);
        assert_eq!(settings.swarm.max_concurrent_agents, 5);
        assert_eq!(
            settings.runtime.rpc_timeout_ms,
            hive_core::constants::DEFAULT_RPC_TIMEOUT_MS
        );
    }

    #[test]
    fn load_deeply_nested_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"swarm": {"defaultModel": {"modelId": "claude-haiku-4"}}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.swarm.default_model.model_id, "claude-haiku-4");
        assert_eq!(settings.swarm.default_model.provider, "anthropic");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_array_replace_not_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"logging": {"level": "debug"}}"#).unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.logging.level, "debug");
        assert!(!settings.logging.json);
    }

    // ── parse_bool ──────────────────────────────────────────────────

    #[test]
    fn parse_bool_true_variants() {
        for val in &["true", "1", "yes", "on", "TRUE", "Yes", "ON"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
    }

    #[test]
    fn parse_bool_false_variants() {
        for val in &["false", "0", "no", "off", "FALSE", "No", "OFF"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
    }

    #[test]
    fn parse_bool_invalid() {
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
        assert_eq!(parse_bool("2"), None);
    }

    // ── parse_u16_range ─────────────────────────────────────────────

    #[test]
    fn parse_u16_valid() {
        assert_eq!(parse_u16_range("9090", 1, 65535), Some(9090));
        assert_eq!(parse_u16_range("1", 1, 65535), Some(1));
        assert_eq!(parse_u16_range("65535", 1, 65535), Some(65535));
    }

    #[test]
    fn parse_u16_out_of_range() {
        assert_eq!(parse_u16_range("0", 1, 65535), None);
    }

    #[test]
    fn parse_u16_invalid() {
        assert_eq!(parse_u16_range("not_a_number", 1, 65535), None);
        assert_eq!(parse_u16_range("", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
    }

    // ── parse_u64_range ─────────────────────────────────────────────

    #[test]
    fn parse_u64_valid() {
        assert_eq!(parse_u64_range("30000", 1000, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("1000", 1000, 600_000), Some(1000));
    }

    #[test]
    fn parse_u64_below_min() {
        assert_eq!(parse_u64_range("500", 1000, 600_000), None);
    }

    #[test]
    fn parse_u64_above_max() {
        assert_eq!(parse_u64_range("700000", 1000, 600_000), None);
    }

    #[test]
    fn parse_u64_invalid() {
        assert_eq!(parse_u64_range("abc", 1000, 600_000), None);
    }

    // ── parse_usize_range ───────────────────────────────────────────

    #[test]
    fn parse_usize_valid() {
        assert_eq!(parse_usize_range("50", 1, 10_000), Some(50));
    }

    #[test]
    fn parse_usize_out_of_range() {
        assert_eq!(parse_usize_range("0", 1, 10_000), None);
        assert_eq!(parse_usize_range("20000", 1, 10_000), None);
    }

    // ── parse_ranged (shared generic behind the per-type helpers) ────

    #[test]
    fn parse_ranged_works_for_every_integer_width() {
        assert_eq!(parse_ranged::<u16>("42", 0, 100), Some(42));
        assert_eq!(parse_ranged::<u32>("42", 0, 100), Some(42));
        assert_eq!(parse_ranged::<u64>("42", 0, 100), Some(42));
        assert_eq!(parse_ranged::<usize>("42", 0, 100), Some(42));
    }

    #[test]
    fn parse_ranged_rejects_negative_for_unsigned() {
        assert_eq!(parse_ranged::<u32>("-1", 0, 100), None);
    }

    // ── read_env_parsed ───────────────────────────────────────────────

    #[test]
    fn read_env_parsed_returns_none_for_unset_var() {
        let result: Option<u16> = read_env_parsed("HIVE_SETTINGS_TEST_UNSET_VAR", "u16", |v| {
            parse_ranged(v, 1, 100)
        });
        assert_eq!(result, None);
    }
}
