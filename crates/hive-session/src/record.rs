//! Record shapes stored in a session JSONL file, one JSON value per line.

use hive_core::model::MessageRole;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of a session log.
///
/// `message` is reserved for the external coding-agent library's own chat
/// history; `custom` is the runtime's and swarm's durable side-channel
/// (persisted `threadId`, context-window state, conversation projection
/// entries). Neither kind is schema-validated beyond this dispatch —
/// consumers validate `data`'s shape themselves.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionRecord {
    Message {
        role: MessageRole,
        content: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    Custom {
        custom_type: String,
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
}

impl SessionRecord {
    /// Build a `custom` record stamped with the current UTC time.
    #[must_use]
    pub fn custom(custom_type: impl Into<String>, data: Value) -> Self {
        Self::Custom {
            custom_type: custom_type.into(),
            data,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Build a `message` record stamped with the current UTC time.
    #[must_use]
    pub fn message(role: MessageRole, content: Value) -> Self {
        Self::Message {
            role,
            content,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// The record's `custom_type`, if it's a `custom` record with the given
    /// type name.
    #[must_use]
    pub fn as_custom(&self, custom_type: &str) -> Option<&Value> {
        match self {
            Self::Custom { custom_type: ty, data, .. } if ty == custom_type => Some(data),
            _ => None,
        }
    }
}
