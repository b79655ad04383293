//! Shared validation error type.
//!
//! Crate-specific error hierarchies (`RpcError`, `RuntimeError`,
//! `SwarmError`, `CronError`) live in their owning crates and wrap this
//! where they need to surface an id/shape problem.

use serde::{Deserialize, Serialize};

/// Errors raised while constructing or normalizing shared data-model types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// An agent id failed `^[a-z0-9-]{1,48}$` validation.
    #[error("invalid agent id: {0:?}")]
    InvalidAgentId(String),

    /// A `cwd` fell outside the configured allowlisted root.
    #[error("cwd outside allowlisted root: {0}")]
    CwdNotAllowed(String),

    /// An archetype id has no registered prompt.
    #[error("unknown archetype: {0}")]
    UnknownArchetype(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(
            ValidationError::InvalidAgentId("Bad Id".into()).to_string(),
            "invalid agent id: \"Bad Id\""
        );
        assert_eq!(
            ValidationError::CwdNotAllowed("/etc".into()).to_string(),
            "cwd outside allowlisted root: /etc"
        );
    }
}
