//! Settings shape for the hive swarm daemon.
//!
//! Mirrors [`crate::loader`]'s three-layer precedence: compiled defaults,
//! `~/.hive/settings.json`, then `HIVE_*` environment overrides.

use hive_core::model::ModelSelector;
use serde::{Deserialize, Serialize};

/// Root settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveSettings {
    pub version: String,
    pub name: String,
    pub daemon: DaemonSettings,
    pub swarm: SwarmSettings,
    pub runtime: RuntimeSettings,
    pub cron: CronSettings,
    pub logging: LoggingSettings,
}

impl Default for HiveSettings {
    fn default() -> Self {
        Self {
            version: hive_core::constants::VERSION.to_owned(),
            name: hive_core::constants::NAME.to_owned(),
            daemon: DaemonSettings::default(),
            swarm: SwarmSettings::default(),
            runtime: RuntimeSettings::default(),
            cron: CronSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Process-level daemon settings: where state lives, what binds to what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSettings {
    /// Root directory for all persisted state (`agents.json`, `sessions/`,
    /// `schedules/`).
    pub data_dir: String,
    /// Root of the cwd allowlist: agents may only be spawned inside this
    /// directory or a descendant of it.
    pub workspace_root: String,
    /// Port the health/event-bus endpoint binds to.
    pub health_port: u16,
    /// Interval between cron due-schedule sweeps, in milliseconds.
    pub cron_tick_interval_ms: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            workspace_root: default_workspace_root(),
            health_port: 8081,
            cron_tick_interval_ms: 30_000,
        }
    }
}

fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    format!("{home}/.hive")
}

fn default_workspace_root() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    format!("{home}/hive-workspaces")
}

/// SwarmManager defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmSettings {
    /// Default model selector assigned to newly created agents.
    pub default_model: ModelSelector,
    /// Maximum number of agents (manager + workers) allowed to run at once.
    pub max_concurrent_agents: usize,
    /// In-memory conversation ring capacity override.
    pub conversation_ring_capacity: usize,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            default_model: ModelSelector::default(),
            max_concurrent_agents: 32,
            conversation_ring_capacity: hive_core::constants::CONVERSATION_RING_CAPACITY,
        }
    }
}

/// AgentRuntime / JsonRpcClient defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    /// Path to the external coding-agent child binary.
    pub child_binary_path: String,
    /// Request timeout for JSON-RPC calls to a child, in milliseconds.
    /// `0` disables the timeout.
    pub rpc_timeout_ms: u64,
    /// Number of times a crashed/exited runtime is restarted before the
    /// agent is marked `Errored`.
    pub max_restart_attempts: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            child_binary_path: "agent-cli".to_owned(),
            rpc_timeout_ms: hive_core::constants::DEFAULT_RPC_TIMEOUT_MS,
            max_restart_attempts: 3,
        }
    }
}

/// CronScheduler defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronSettings {
    /// IANA timezone used to evaluate cron expressions lacking an explicit
    /// zone.
    pub default_timezone: String,
    /// Maximum number of consecutive failed fires before a recurring
    /// schedule is auto-disabled.
    pub max_consecutive_failures: u32,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_owned(),
            max_consecutive_failures: 5,
        }
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    /// `tracing` env-filter directive, e.g. `"info"` or `"hive_swarm=debug"`.
    pub level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let settings = HiveSettings::default();
        let value = serde_json::to_value(&settings).unwrap();
        let parsed: HiveSettings = serde_json::from_value(value).unwrap();
        assert_eq!(settings, parsed);
    }

    #[test]
    fn default_data_dir_is_under_home() {
        let settings = HiveSettings::default();
        assert!(settings.daemon.data_dir.ends_with("/.hive"));
    }

    #[test]
    fn default_rpc_timeout_matches_core_constant() {
        let settings = HiveSettings::default();
        assert_eq!(
            settings.runtime.rpc_timeout_ms,
            hive_core::constants::DEFAULT_RPC_TIMEOUT_MS
        );
    }
}
