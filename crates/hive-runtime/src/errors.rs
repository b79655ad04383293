//! Runtime error types.

use hive_rpc::RpcError;
use thiserror::Error;

/// Which boot step a startup failure occurred in, used to report a
/// user-actionable error without swallowing the phase it happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootPhase {
    Initialize,
    Authentication,
    ThreadBootstrap,
}

impl std::fmt::Display for BootPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialize => write!(f, "initialize"),
            Self::Authentication => write!(f, "authentication"),
            Self::ThreadBootstrap => write!(f, "thread_bootstrap"),
        }
    }
}

/// Errors that can occur while driving a single agent's runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The boot sequence failed; the runtime never became usable.
    #[error("startup failed at {phase}: {message}")]
    Startup { phase: BootPhase, message: String },

    /// `account/read` reported the child still isn't authenticated after a
    /// login attempt.
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// Neither a persisted `threadId` nor a fresh `thread/start` produced
    /// one.
    #[error("child did not return a thread id")]
    MissingThreadId,

    /// The underlying JSON-RPC transport failed.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// `turn/start` failed; the runtime recovered to `Idle` and reports
    /// this to the caller that requested the prompt.
    #[error("failed to start turn: {0}")]
    TurnStartFailed(String),

    /// The runtime has transitioned to `Terminated`; every subsequent
    /// operation is rejected with this error.
    #[error("agent is terminated")]
    Terminated,

    /// Internal invariant violation.
    #[error("internal runtime error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether a caller could reasonably retry after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::TurnStartFailed(_) => true,
            Self::Rpc(e) => e.is_recoverable(),
            Self::Startup { .. }
            | Self::AuthenticationRequired(_)
            | Self::MissingThreadId
            | Self::Terminated
            | Self::Internal(_) => false,
        }
    }

    /// Short category string, used as the `phase` field reported via
    /// `onRuntimeError`.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Startup { .. } => "startup",
            Self::AuthenticationRequired(_) => "authentication",
            Self::MissingThreadId => "thread_bootstrap",
            Self::Rpc(_) => "rpc",
            Self::TurnStartFailed(_) => "prompt_start",
            Self::Terminated => "terminated",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_error_display() {
        let err = RuntimeError::Startup {
            phase: BootPhase::Authentication,
            message: "no api key".into(),
        };
        assert_eq!(
            err.to_string(),
            "startup failed at authentication: no api key"
        );
        assert_eq!(err.category(), "startup");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn turn_start_failed_is_recoverable() {
        let err = RuntimeError::TurnStartFailed("child rejected input".into());
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "prompt_start");
    }

    #[test]
    fn terminated_is_not_recoverable() {
        assert!(!RuntimeError::Terminated.is_recoverable());
        assert_eq!(RuntimeError::Terminated.category(), "terminated");
    }

    #[test]
    fn missing_thread_id_category() {
        assert_eq!(RuntimeError::MissingThreadId.category(), "thread_bootstrap");
    }

    #[test]
    fn boot_phase_display() {
        assert_eq!(BootPhase::Initialize.to_string(), "initialize");
        assert_eq!(BootPhase::ThreadBootstrap.to_string(), "thread_bootstrap");
    }
}
