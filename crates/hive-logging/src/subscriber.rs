//! Process-wide `tracing` subscriber setup.
//!
//! The daemon has no SQL-backed log store: every session already gets a
//! durable, structured record in its own JSONL file (see `hive-session`).
//! This crate's job is narrower — turn the `HiveSettings::logging` knobs
//! into a global `tracing` subscriber, and give callers a span helper that
//! carries the context fields (`agent_id`, `role`) a reader needs to follow
//! one agent's log lines out of the interleaved stream of a whole swarm.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::errors::{LoggingError, Result};
use crate::types::LogLevel;

/// Install the global `tracing` subscriber.
///
/// `level` is used only when `RUST_LOG` is unset. `json` selects
/// newline-delimited JSON formatting over the human-readable default;
/// daemons running under a log collector should set it.
///
/// # Errors
///
/// Returns [`LoggingError::AlreadyInitialized`] if a global subscriber is
/// already installed (e.g. called twice, or from within a test harness that
/// installs its own).
pub fn init(level: LogLevel, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|_| LoggingError::AlreadyInitialized)
}

/// Open a span carrying the agent context fields that every log line
/// emitted while handling that agent's turn should inherit.
#[must_use]
pub fn agent_span(agent_id: &str, role: &str) -> tracing::Span {
    tracing::info_span!("agent", agent_id = %agent_id, role = %role)
}
