//! `SwarmManager` error taxonomy.

use hive_core::errors::ValidationError;
use hive_core::ids::AgentId;
use hive_runtime::RuntimeError;
use thiserror::Error;

/// Errors raised by `SwarmManager` operations.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// No descriptor exists for the given id.
    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// The caller is not a manager, or not the expected one.
    #[error("caller {0} is not a running manager")]
    CallerNotManager(AgentId),

    /// A manager tried to address an agent it doesn't own.
    #[error("agent {target} is not owned by manager {caller}")]
    NotOwner { caller: AgentId, target: AgentId },

    /// The target descriptor is terminated.
    #[error("agent {0} is terminated")]
    TargetTerminated(AgentId),

    /// Managers cannot be killed through `killAgent`.
    #[error("{0} is a manager; use deleteManager instead")]
    CannotKillManager(AgentId),

    /// The primary manager can't be deleted while it's the only manager.
    #[error("cannot delete the primary manager while it is the only manager")]
    CannotDeleteSolePrimary,

    /// `cwd` validation failed.
    #[error(transparent)]
    InvalidCwd(#[from] ValidationError),

    /// The underlying runtime failed to boot or accept a delivery.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Persisted-store I/O failure.
    #[error("agent store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted-store (de)serialization failure.
    #[error("agent store encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Session store failure.
    #[error("session store error: {0}")]
    Session(#[from] hive_session::SessionError),

    /// `createManager` called by a non-bootstrap caller while a manager
    /// already exists.
    #[error("a manager already exists; createManager requires an existing manager caller")]
    ManagerAlreadyBootstrapped,
}

impl SwarmError {
    /// Short category string for logging/telemetry.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownAgent(_) => "unknown_agent",
            Self::CallerNotManager(_) => "caller_not_manager",
            Self::NotOwner { .. } => "not_owner",
            Self::TargetTerminated(_) => "target_terminated",
            Self::CannotKillManager(_) => "cannot_kill_manager",
            Self::CannotDeleteSolePrimary => "cannot_delete_sole_primary",
            Self::InvalidCwd(_) => "invalid_cwd",
            Self::Runtime(_) => "runtime",
            Self::Io(_) => "io",
            Self::Encode(_) => "encode",
            Self::Session(_) => "session",
            Self::ManagerAlreadyBootstrapped => "manager_already_bootstrapped",
        }
    }
}

/// Result type for `SwarmManager` operations.
pub type Result<T> = std::result::Result<T, SwarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_covers_input_validation_kinds() {
        let id = AgentId::parse("worker-1").unwrap();
        assert_eq!(SwarmError::UnknownAgent(id.clone()).category(), "unknown_agent");
        assert_eq!(SwarmError::CannotKillManager(id).category(), "cannot_kill_manager");
    }

    #[test]
    fn not_owner_display() {
        let caller = AgentId::parse("mgr").unwrap();
        let target = AgentId::parse("other-worker").unwrap();
        let err = SwarmError::NotOwner { caller, target };
        assert!(err.to_string().contains("not owned by manager"));
    }
}
