//! Branded ID newtypes for type safety.
//!
//! Two families:
//!
//! - [`AgentId`] is a human/caller-chosen identifier, normalized and
//!   validated against `[a-z0-9-]{1,48}` at construction. It is never
//!   randomly generated — managers and workers are named by their callers.
//! - The remaining IDs ([`DeliveryId`], [`ScheduleId`], [`BatchId`]) are
//!   daemon-generated correlation IDs. They use UUID v7 (time-ordered) via
//!   [`uuid::Uuid::now_v7`] so they sort by creation time in logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ValidationError;

fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value, unchecked.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Correlation ID for a queued/pending message delivery.
    DeliveryId
}

branded_id! {
    /// Identifier for a persisted cron schedule.
    ScheduleId
}

branded_id! {
    /// Identifier for a staged attachment upload batch.
    BatchId
}

/// A stable, caller-chosen agent identifier.
///
/// Normalized to lowercase and validated against `^[a-z0-9-]{1,48}$` at
/// construction time. Unlike the correlation IDs above, `AgentId` is never
/// randomly generated: managers and workers are named by `spawnAgent`
/// callers (subject to [`AgentId::uniquify`] on collision).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

const MAX_AGENT_ID_LEN: usize = 48;

impl AgentId {
    /// Normalize and validate a raw agent id.
    ///
    /// Normalization lowercases the input; validation then requires the
    /// result to match `^[a-z0-9-]{1,48}$`.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() || normalized.len() > MAX_AGENT_ID_LEN {
            return Err(ValidationError::InvalidAgentId(normalized));
        }
        if !normalized
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(ValidationError::InvalidAgentId(normalized));
        }
        Ok(Self(normalized))
    }

    /// Construct without validation. Reserved for deserializing
    /// already-validated descriptors read back from disk.
    #[must_use]
    pub fn from_trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append `-2`, `-3`, ... to `self` until `taken` no longer contains it.
    ///
    /// Used by `spawnAgent` to uniquify a worker id that collides with an
    /// existing descriptor.
    #[must_use]
    pub fn uniquify(&self, taken: impl Fn(&str) -> bool) -> Self {
        if !taken(self.as_str()) {
            return self.clone();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{}-{n}", self.0);
            if !taken(&candidate) {
                return Self(candidate);
            }
            n += 1;
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for AgentId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_lowercase_alnum_dash() {
        assert!(AgentId::parse("worker-1").is_ok());
        assert!(AgentId::parse("MGR").is_ok(), "uppercase is normalized, not rejected");
    }

    #[test]
    fn parse_normalizes_case() {
        let id = AgentId::parse("Worker-One").unwrap();
        assert_eq!(id.as_str(), "worker-one");
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(AgentId::parse("").is_err());
        assert!(AgentId::parse("   ").is_err());
    }

    #[test]
    fn parse_rejects_invalid_chars() {
        assert!(AgentId::parse("worker_1").is_err());
        assert!(AgentId::parse("worker 1").is_err());
        assert!(AgentId::parse("worker/1").is_err());
    }

    #[test]
    fn parse_rejects_too_long() {
        let raw = "a".repeat(49);
        assert!(AgentId::parse(raw).is_err());
        let raw = "a".repeat(48);
        assert!(AgentId::parse(raw).is_ok());
    }

    #[test]
    fn uniquify_is_noop_when_free() {
        let id = AgentId::parse("worker").unwrap();
        let result = id.uniquify(|_| false);
        assert_eq!(result.as_str(), "worker");
    }

    #[test]
    fn uniquify_appends_suffix_on_collision() {
        let id = AgentId::parse("worker").unwrap();
        let result = id.uniquify(|s| s == "worker" || s == "worker-2");
        assert_eq!(result.as_str(), "worker-3");
    }

    #[test]
    fn delivery_id_new_is_uuid_v7() {
        let id = DeliveryId::new();
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn schedule_id_serde_roundtrip() {
        let id = ScheduleId::from_string("sched-1".to_owned());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sched-1\"");
        let back: ScheduleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn agent_id_ordering_is_lexicographic() {
        let a = AgentId::parse("a").unwrap();
        let b = AgentId::parse("b").unwrap();
        assert!(a < b);
    }
}
