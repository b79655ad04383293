//! Session store error types.

use thiserror::Error;

/// Errors that can occur opening, writing, or reading a session file.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Filesystem I/O failure.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A record failed to serialize to JSON (never expected in practice,
    /// since `SessionRecord` contains only `serde_json::Value` payloads).
    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, SessionError>;
