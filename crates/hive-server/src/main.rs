//! # hive-server
//!
//! Daemon binary — boots the swarm, starts the cron poll loop, and waits
//! for a shutdown signal. There is no HTTP/WebSocket surface here: the
//! event bus and agent API are consumed in-process by embedders, not
//! exposed over the network.

#![deny(unsafe_code)]

mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use hive_core::collab::{AllowlistCwdPolicy, StaticArchetypeRegistry};
use hive_core::ids::AgentId;
use hive_cron::{CronScheduler, CronSchedulerConfig};
use hive_logging::LogLevel;
use hive_swarm::{SwarmManager, SwarmManagerConfig};

use shutdown::ShutdownCoordinator;

/// Hive swarm orchestrator daemon.
#[derive(Parser, Debug)]
#[command(name = "hive-server", about = "Hive swarm orchestrator daemon")]
struct Cli {
    /// Override the data directory (`agents.json`, `sessions/`, `schedules/`).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the cwd allowlist root agents may be spawned inside.
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Id of the primary, always-present manager.
    #[arg(long, default_value = "root")]
    primary_manager_id: String,

    /// Path to the settings file. Defaults to `~/.hive/settings.json`.
    #[arg(long)]
    settings_path: Option<PathBuf>,
}

/// Load `secrets.json` (`{ENV_NAME: value}`) from the data directory, if
/// present. Passed into `SwarmManagerConfig` so every spawned child process
/// inherits it alongside its own derived vars; nothing is written into this
/// process's own environment (mutating it process-wide is `unsafe` as of the
/// 2024 edition, and this workspace denies `unsafe_code` everywhere).
fn load_secrets(data_dir: &std::path::Path) -> Result<std::collections::HashMap<String, String>> {
    let path = data_dir.join("secrets.json");
    if !path.exists() {
        return Ok(std::collections::HashMap::new());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings_path
        .unwrap_or_else(hive_settings::loader::settings_path);
    let mut settings =
        hive_settings::loader::load_settings_from_path(&settings_path).unwrap_or_default();

    if let Some(data_dir) = &args.data_dir {
        settings.daemon.data_dir = data_dir.to_string_lossy().into_owned();
    }
    if let Some(workspace_root) = &args.workspace_root {
        settings.daemon.workspace_root = workspace_root.to_string_lossy().into_owned();
    }

    hive_logging::init(LogLevel::from_str_lossy(&settings.logging.level), settings.logging.json)
        .context("failed to initialize logging")?;

    let data_dir = PathBuf::from(&settings.daemon.data_dir);
    let secrets = load_secrets(&data_dir).context("failed to load secrets.json")?;
    tracing::info!(secret_count = secrets.len(), "secrets loaded");

    let primary_manager_id = AgentId::parse(&args.primary_manager_id)
        .context("invalid --primary-manager-id")?;
    let cwd_policy = Arc::new(AllowlistCwdPolicy::new(settings.daemon.workspace_root.clone()));
    let archetypes = Arc::new(StaticArchetypeRegistry::new());
    let cron_tick_interval = Duration::from_millis(settings.daemon.cron_tick_interval_ms);

    let swarm_config = SwarmManagerConfig {
        settings,
        primary_manager_id,
        child_args: Vec::new(),
        secrets,
    };
    let swarm = Arc::new(SwarmManager::new(swarm_config, cwd_policy, archetypes));

    swarm.boot().await.context("swarm boot failed")?;
    tracing::info!(
        agents = swarm.list_agents().len(),
        "swarm booted"
    );

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let cron = Arc::new(CronScheduler::new(
        CronSchedulerConfig { data_dir, tick_interval: cron_tick_interval },
        swarm.clone(),
    ));
    let cron_for_task = cron.clone();
    let cron_handle = tokio::spawn(async move {
        cron_for_task.run().await;
    });
    coordinator.register_task(cron_handle);

    wait_for_shutdown_signal().await?;
    tracing::info!("shutdown signal received");

    cron.stop();
    coordinator.graceful_shutdown(Some(Duration::from_secs(30))).await;

    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c"),
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")
}
