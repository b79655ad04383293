//! Shared data model: agent descriptors, conversation entries, normalized
//! runtime session events, and cron schedules.
//!
//! Events share a tagged, `camelCase`-on-the-wire `BaseEvent` idiom so every
//! variant carries the same envelope fields regardless of payload shape.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, DeliveryId, ScheduleId};

// ─────────────────────────────────────────────────────────────────────────
// AgentDescriptor
// ─────────────────────────────────────────────────────────────────────────

/// Role of an agent within the swarm tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Manager,
    Worker,
}

/// Public lifecycle status of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Streaming,
    Terminated,
    StoppedOnRestart,
}

impl AgentStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Model thinking-effort level, passed through to the child on thread
/// start/resume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingLevel {
    Low,
    Medium,
    High,
}

/// Provider/model selection for an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSelector {
    pub provider: String,
    pub model_id: String,
    pub thinking_level: ThinkingLevel,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_owned(),
            model_id: "claude-opus-4-6".to_owned(),
            thinking_level: ThinkingLevel::Medium,
        }
    }
}

/// Live telemetry mirrored into status events; absent until the first
/// `turn_end` reports usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUsage {
    pub tokens: u64,
    pub context_window: u64,
}

/// A single agent in the swarm tree.
///
/// `agent_id` is unique across the tree and immutable after creation;
/// `session_file` is derived deterministically from `agent_id`; every
/// worker's `manager_id` must reference a non-terminated descriptor at
/// steady state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub agent_id: AgentId,
    pub display_name: String,
    pub role: AgentRole,
    pub manager_id: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archetype_id: Option<String>,
    pub status: AgentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub cwd: String,
    pub model: ModelSelector,
    pub session_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_usage: Option<ContextUsage>,
}

impl AgentDescriptor {
    /// `sessions/{agentId}.jsonl`, derived deterministically from the id.
    #[must_use]
    pub fn derive_session_file(data_dir: &str, agent_id: &AgentId) -> String {
        format!("{data_dir}/sessions/{agent_id}.jsonl")
    }

    #[must_use]
    pub fn is_manager(&self) -> bool {
        matches!(self.role, AgentRole::Manager)
    }

    #[must_use]
    pub fn is_self_owned_manager(&self) -> bool {
        self.is_manager() && self.manager_id == self.agent_id
    }
}

/// Total sort order for `agents.json`: primary manager first, then other
/// managers, then workers, each group ordered by `(created_at, agent_id)`.
#[must_use]
pub fn sort_key(primary_manager_id: &AgentId, d: &AgentDescriptor) -> (u8, chrono::DateTime<chrono::Utc>, AgentId) {
    let tier = if &d.agent_id == primary_manager_id {
        0
    } else if d.is_manager() {
        1
    } else {
        2
    };
    (tier, d.created_at, d.agent_id.clone())
}

// ─────────────────────────────────────────────────────────────────────────
// ConversationEntry
// ─────────────────────────────────────────────────────────────────────────

/// Origin channel a conversation message arrived through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Slack,
    Telegram,
}

/// Where a conversation message originated from, for channel-aware replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContext {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Who/what a `conversation_message` is attributed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    UserInput,
    SpeakToUser,
    System,
    RuntimeLog,
}

/// An attachment embedded in a conversation message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Attachment {
    Text { file_name: String, content: String },
    Binary { file_name: String, absolute_path: String, mime: String },
    Image { mime: String, base64: String },
}

/// A line of runtime diagnostic output, normalized from
/// [`crate::model::RuntimeSessionEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeLogKind {
    MessageStart,
    MessageEnd,
    ToolExecutionStart,
    ToolExecutionUpdate,
    ToolExecutionEnd,
}

/// A sum type over the two kinds of entry appended to an agent's
/// conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEntry {
    ConversationMessage {
        agent_id: AgentId,
        timestamp: chrono::DateTime<chrono::Utc>,
        source: MessageSource,
        text: String,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        attachments: Vec<Attachment>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_context: Option<SourceContext>,
    },
    ConversationLog {
        agent_id: AgentId,
        timestamp: chrono::DateTime<chrono::Utc>,
        kind: RuntimeLogKind,
        text: String,
    },
}

impl ConversationEntry {
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::ConversationMessage { agent_id, .. } | Self::ConversationLog { agent_id, .. } => agent_id,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        match self {
            Self::ConversationMessage { timestamp, .. } | Self::ConversationLog { timestamp, .. } => *timestamp,
        }
    }

    /// Entries that must never be discarded by ring-buffer trimming: the
    /// user-visible web transcript.
    #[must_use]
    pub fn is_preserved(&self) -> bool {
        match self {
            Self::ConversationMessage { source, source_context, .. } => {
                matches!(source, MessageSource::UserInput | MessageSource::SpeakToUser)
                    && source_context.as_ref().is_some_and(|c| c.channel == Channel::Web)
            }
            Self::ConversationLog { .. } => false,
        }
    }

    /// De-duplication key used at the event-bus subscriber boundary for
    /// `conversation_log` entries that may be double-emitted.
    #[must_use]
    pub fn dedup_key(&self) -> Option<(AgentId, i64, RuntimeLogKind, u64)> {
        match self {
            Self::ConversationLog { agent_id, timestamp, kind, text } => {
                use std::hash::{Hash, Hasher};
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                text.hash(&mut hasher);
                Some((agent_id.clone(), timestamp.timestamp_millis(), *kind, hasher.finish()))
            }
            Self::ConversationMessage { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// RuntimeSessionEvent
// ─────────────────────────────────────────────────────────────────────────

/// Normalized tool-item kind, after translation through the tool-item
/// normalization table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolKind {
    CommandExecution,
    FileChange,
    McpToolCall { server: String, tool: String },
    CollabAgentToolCall { tool: String },
    WebSearch,
    ImageView,
    Other(String),
}

impl ToolKind {
    /// Render the normalized tool name used in `tool_execution_*` events.
    #[must_use]
    pub fn normalized_name(&self) -> String {
        match self {
            Self::CommandExecution => "command_execution".to_owned(),
            Self::FileChange => "file_change".to_owned(),
            Self::McpToolCall { server, tool } => format!("mcp:{server}/{tool}"),
            Self::CollabAgentToolCall { tool } => format!("collab:{tool}"),
            Self::WebSearch => "web_search".to_owned(),
            Self::ImageView => "image_view".to_owned(),
            Self::Other(name) => name.clone(),
        }
    }
}

/// Message role for `message_start`/`message_update`/`message_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// The normalized event vocabulary emitted by `AgentRuntime` to its
/// subscribers. Unlike child-process notifications (which are
/// provider-specific), this is the stable internal contract consumed by
/// `SwarmManager`'s conversation projector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeSessionEvent {
    AgentStart,
    AgentEnd { error: Option<String> },
    TurnStart { turn_id: String },
    TurnEnd,
    MessageStart { item_id: String, role: MessageRole },
    MessageUpdate { item_id: String, role: MessageRole, delta: String },
    MessageEnd { item_id: String, role: MessageRole, text: String, is_error: bool },
    ToolExecutionStart { item_id: String, tool_name: String },
    ToolExecutionUpdate { item_id: String, tool_name: String, delta: String },
    ToolExecutionEnd { item_id: String, tool_name: String, is_error: bool },
    AutoCompactionStart,
    AutoCompactionEnd,
    AutoRetryStart { attempt: u32 },
    AutoRetryEnd,
}

// ─────────────────────────────────────────────────────────────────────────
// Schedule
// ─────────────────────────────────────────────────────────────────────────

/// A cron-dispatched message target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub cron: String,
    pub message: String,
    pub one_shot: bool,
    pub timezone: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub next_fire_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A queued-but-not-yet-acknowledged message delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelivery {
    pub delivery_id: DeliveryId,
    pub message_key: String,
}

/// A steer queued for injection into the active turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedSteer {
    pub delivery_id: DeliveryId,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_id(s: &str) -> AgentId {
        AgentId::parse(s).unwrap()
    }

    #[test]
    fn sort_key_puts_primary_manager_first() {
        let primary = agent_id("root");
        let now = chrono::Utc::now();
        let primary_desc = AgentDescriptor {
            agent_id: primary.clone(),
            display_name: "root".into(),
            role: AgentRole::Manager,
            manager_id: primary.clone(),
            archetype_id: Some("manager".into()),
            status: AgentStatus::Idle,
            created_at: now,
            updated_at: now,
            cwd: "/tmp".into(),
            model: ModelSelector { provider: "p".into(), model_id: "m".into(), thinking_level: ThinkingLevel::Medium },
            session_file: "x".into(),
            context_usage: None,
        };
        let mut worker_desc = primary_desc.clone();
        worker_desc.agent_id = agent_id("worker");
        worker_desc.role = AgentRole::Worker;

        let (tier_primary, ..) = sort_key(&primary, &primary_desc);
        let (tier_worker, ..) = sort_key(&primary, &worker_desc);
        assert!(tier_primary < tier_worker);
    }

    #[test]
    fn conversation_message_preserved_only_for_web_user_visible() {
        let msg = ConversationEntry::ConversationMessage {
            agent_id: agent_id("mgr"),
            timestamp: chrono::Utc::now(),
            source: MessageSource::UserInput,
            text: "hi".into(),
            attachments: vec![],
            source_context: Some(SourceContext { channel: Channel::Web, channel_id: None, user_id: None, message_id: None, thread_id: None }),
        };
        assert!(msg.is_preserved());

        let slack_msg = ConversationEntry::ConversationMessage {
            agent_id: agent_id("mgr"),
            timestamp: chrono::Utc::now(),
            source: MessageSource::UserInput,
            text: "hi".into(),
            attachments: vec![],
            source_context: Some(SourceContext { channel: Channel::Slack, channel_id: None, user_id: None, message_id: None, thread_id: None }),
        };
        assert!(!slack_msg.is_preserved());
    }

    #[test]
    fn runtime_log_never_preserved() {
        let log = ConversationEntry::ConversationLog {
            agent_id: agent_id("w"),
            timestamp: chrono::Utc::now(),
            kind: RuntimeLogKind::MessageEnd,
            text: "done".into(),
        };
        assert!(!log.is_preserved());
        assert!(log.dedup_key().is_some());
    }

    #[test]
    fn tool_kind_normalization() {
        assert_eq!(ToolKind::CommandExecution.normalized_name(), "command_execution");
        assert_eq!(
            ToolKind::McpToolCall { server: "memory".into(), tool: "search".into() }.normalized_name(),
            "mcp:memory/search"
        );
        assert_eq!(
            ToolKind::CollabAgentToolCall { tool: "merge".into() }.normalized_name(),
            "collab:merge"
        );
    }

    #[test]
    fn conversation_entry_serde_roundtrip() {
        let entry = ConversationEntry::ConversationLog {
            agent_id: agent_id("w"),
            timestamp: chrono::Utc::now(),
            kind: RuntimeLogKind::ToolExecutionStart,
            text: "bash".into(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: ConversationEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
