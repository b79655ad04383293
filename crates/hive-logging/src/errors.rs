//! Logging error types.

use thiserror::Error;

/// Errors that can occur when configuring process logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global `tracing` subscriber was already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Result type for logging operations.
pub type Result<T> = std::result::Result<T, LoggingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_initialized_display() {
        let err = LoggingError::AlreadyInitialized;
        assert!(err.to_string().contains("already installed"));
    }
}
