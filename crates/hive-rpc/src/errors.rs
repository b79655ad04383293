//! Errors produced by [`crate::client::JsonRpcClient`].

use thiserror::Error;

use crate::types::RpcId;

/// Failures the transport can produce.
#[derive(Debug, Error)]
pub enum RpcError {
    /// `spawn` failed because the configured binary does not exist.
    #[error("child binary not found: {0}")]
    BinaryMissing(String),

    /// `spawn` failed for a reason other than a missing binary.
    #[error("failed to spawn child process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// `request` timed out waiting for a matching response.
    #[error("request {id} ({method}) timed out after {timeout_ms}ms")]
    Timeout {
        id: RpcId,
        method: String,
        timeout_ms: u64,
    },

    /// The child returned a JSON-RPC error object for a request.
    #[error("child returned error {code} for {method}: {message}")]
    RemoteError {
        method: String,
        code: i64,
        message: String,
    },

    /// The client was disposed (explicitly, or because the child exited)
    /// while a request was pending, or before a new one could be sent.
    #[error("client disposed")]
    Disposed,

    /// The child process exited without a preceding `dispose()`.
    #[error("child exited unexpectedly (code={exit_code:?}, signal={signal:?})")]
    UnexpectedExit {
        exit_code: Option<i32>,
        signal: Option<i32>,
    },

    /// Writing to the child's stdin failed.
    #[error("failed to write to child stdin: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// A line on stdout/stdin failed to serialize or deserialize as JSON.
    #[error("malformed JSON-RPC frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl RpcError {
    /// Whether a caller could reasonably retry the operation that produced
    /// this error (a fresh client, a fresh request).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RemoteError { .. } => true,
            Self::BinaryMissing(_)
            | Self::SpawnFailed(_)
            | Self::Disposed
            | Self::UnexpectedExit { .. }
            | Self::WriteFailed(_)
            | Self::Malformed(_) => false,
        }
    }

    /// Short category string, used when translating into session events.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::BinaryMissing(_) => "binary_missing",
            Self::SpawnFailed(_) => "spawn_failed",
            Self::Timeout { .. } => "timeout",
            Self::RemoteError { .. } => "remote_error",
            Self::Disposed => "disposed",
            Self::UnexpectedExit { .. } => "unexpected_exit",
            Self::WriteFailed(_) => "write_failed",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Result type for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_recoverable() {
        let err = RpcError::Timeout {
            id: RpcId::Number(1),
            method: "turn/start".into(),
            timeout_ms: 30_000,
        };
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "timeout");
        assert!(err.to_string().contains("turn/start"));
    }

    #[test]
    fn disposed_is_not_recoverable() {
        let err = RpcError::Disposed;
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "disposed");
    }

    #[test]
    fn unexpected_exit_display() {
        let err = RpcError::UnexpectedExit {
            exit_code: Some(1),
            signal: None,
        };
        assert!(err.to_string().contains("code=Some(1)"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn remote_error_is_recoverable() {
        let err = RpcError::RemoteError {
            method: "account/read".into(),
            code: -32000,
            message: "not authenticated".into(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "remote_error");
    }
}
