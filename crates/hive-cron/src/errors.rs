//! `CronScheduler` error taxonomy.

use hive_core::ids::{AgentId, ScheduleId};
use thiserror::Error;

/// Errors raised by `CronScheduler` operations.
#[derive(Debug, Error)]
pub enum CronError {
    /// The schedule's cron expression failed to parse.
    #[error("invalid cron expression {expr:?}: {source}")]
    InvalidExpression {
        expr: String,
        #[source]
        source: cron::error::Error,
    },

    /// The schedule's IANA timezone name is unrecognized.
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    /// The cron expression has no upcoming fire time from the given instant
    /// (a syntactically valid but unsatisfiable expression).
    #[error("cron expression {0:?} has no upcoming occurrence")]
    NoUpcomingFire(String),

    /// No schedule exists with the given id for the given manager.
    #[error("unknown schedule {0} for manager {1}")]
    UnknownSchedule(ScheduleId, AgentId),

    /// Schedules-file I/O failure.
    #[error("schedules store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Schedules-file (de)serialization failure.
    #[error("schedules store encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Dispatching the fired message through the swarm failed.
    #[error("dispatch to swarm failed: {0}")]
    Dispatch(#[from] hive_swarm::SwarmError),
}

impl CronError {
    /// Short category string for logging/telemetry.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidExpression { .. } => "invalid_expression",
            Self::InvalidTimezone(_) => "invalid_timezone",
            Self::NoUpcomingFire(_) => "no_upcoming_fire",
            Self::UnknownSchedule(..) => "unknown_schedule",
            Self::Io(_) => "io",
            Self::Encode(_) => "encode",
            Self::Dispatch(_) => "dispatch",
        }
    }
}

/// Result type for `CronScheduler` operations.
pub type Result<T> = std::result::Result<T, CronError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_timezone_category() {
        let err = CronError::InvalidTimezone("Mars/Olympus".into());
        assert_eq!(err.category(), "invalid_timezone");
        assert!(err.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn unknown_schedule_display() {
        let manager = AgentId::parse("mgr").unwrap();
        let schedule = ScheduleId::from_string("sched-1".into());
        let err = CronError::UnknownSchedule(schedule, manager);
        assert_eq!(err.category(), "unknown_schedule");
        assert!(err.to_string().contains("sched-1"));
    }
}
