//! The conversation projector: turns `RuntimeSessionEvent`s from a runtime
//! into the `ConversationEntry` values persisted to session files and
//! published on the event bus.
//!
//! Manager runtimes don't produce user-visible assistant messages through
//! ordinary `message_end` events — they publish via a `speak_to_user` tool
//! call instead, so its delta text is buffered per `(agent, itemId)` and
//! flushed as a `ConversationMessage` only when that tool call completes
//! successfully.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use hive_core::ids::AgentId;
use hive_core::model::{
    Attachment, Channel, ConversationEntry, MessageRole, MessageSource, RuntimeLogKind,
    RuntimeSessionEvent, SourceContext,
};

const SPEAK_TO_USER_TOOL: &str = "speak_to_user";

/// Dedup key type for `conversation_log` entries (see
/// `ConversationEntry::dedup_key`).
type DedupKey = (AgentId, i64, RuntimeLogKind, u64);

struct DedupRing {
    order: VecDeque<DedupKey>,
    seen: HashSet<DedupKey>,
    capacity: usize,
}

impl DedupRing {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(4096)),
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Returns `true` if `key` is new (and should be emitted).
    fn admit(&mut self, key: DedupKey) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

/// A bounded in-memory view of one agent's conversation history.
///
/// Trimming prefers discarding non-preserved entries first (tool/log noise)
/// so the user-visible web transcript survives as long as possible; only
/// once every entry is preserved does it fall back to dropping the oldest
/// preserved one.
pub struct ConversationRing {
    capacity: usize,
    entries: VecDeque<ConversationEntry>,
}

impl ConversationRing {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: VecDeque::new() }
    }

    /// Build a ring already populated from a persisted entry list (e.g. on
    /// boot, hydrating from the on-disk session log), applying the same
    /// trim policy as `push`.
    #[must_use]
    pub fn from_entries(capacity: usize, entries: Vec<ConversationEntry>) -> Self {
        let mut ring = Self::new(capacity);
        for entry in entries {
            ring.push(entry);
        }
        ring
    }

    pub fn push(&mut self, entry: ConversationEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            let evict_at = self.entries.iter().position(|e| !e.is_preserved()).unwrap_or(0);
            self.entries.remove(evict_at);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Translates runtime events into persisted/published conversation
/// entries, one instance shared across every agent in the swarm.
pub struct ConversationProjector {
    dedup: Mutex<DedupRing>,
    speak_buffers: Mutex<HashMap<(AgentId, String), String>>,
}

impl ConversationProjector {
    #[must_use]
    pub fn new(dedup_capacity: usize) -> Self {
        Self {
            dedup: Mutex::new(DedupRing::new(dedup_capacity)),
            speak_buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Project one runtime event for `agent_id` (a manager iff
    /// `is_manager`) into the conversation entries to persist/publish, in
    /// order.
    pub fn project(
        &self,
        agent_id: &AgentId,
        is_manager: bool,
        event: &RuntimeSessionEvent,
    ) -> Vec<ConversationEntry> {
        let now = chrono::Utc::now();
        match event {
            RuntimeSessionEvent::MessageEnd { role, text, is_error, .. } => {
                self.project_message_end(agent_id, is_manager, *role, text, *is_error, now)
            }
            RuntimeSessionEvent::AgentEnd { error: Some(message) } if is_manager => {
                vec![ConversationEntry::ConversationMessage {
                    agent_id: agent_id.clone(),
                    timestamp: now,
                    source: MessageSource::System,
                    text: diagnose_failure(message),
                    attachments: Vec::new(),
                    source_context: None,
                }]
            }
            RuntimeSessionEvent::ToolExecutionUpdate { item_id, tool_name, delta } if is_manager
                && tool_name == SPEAK_TO_USER_TOOL =>
            {
                self.speak_buffers
                    .lock()
                    .entry((agent_id.clone(), item_id.clone()))
                    .or_default()
                    .push_str(delta);
                Vec::new()
            }
            RuntimeSessionEvent::ToolExecutionEnd { item_id, tool_name, is_error } if is_manager
                && tool_name == SPEAK_TO_USER_TOOL =>
            {
                let text = self
                    .speak_buffers
                    .lock()
                    .remove(&(agent_id.clone(), item_id.clone()))
                    .unwrap_or_default();
                if *is_error || text.is_empty() {
                    return Vec::new();
                }
                vec![ConversationEntry::ConversationMessage {
                    agent_id: agent_id.clone(),
                    timestamp: now,
                    source: MessageSource::SpeakToUser,
                    text,
                    attachments: Vec::new(),
                    source_context: None,
                }]
            }
            other => self.project_log_entry(agent_id, other, now),
        }
    }

    fn project_message_end(
        &self,
        agent_id: &AgentId,
        is_manager: bool,
        role: MessageRole,
        text: &str,
        is_error: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Vec<ConversationEntry> {
        let mut entries = self.project_log_entry(
            agent_id,
            &RuntimeSessionEvent::MessageEnd {
                item_id: String::new(),
                role,
                text: text.to_owned(),
                is_error,
            },
            now,
        );

        // Managers publish only via `speak_to_user`; ordinary assistant
        // turns don't surface as conversation messages for them.
        if is_manager {
            return entries;
        }
        if matches!(role, MessageRole::Assistant | MessageRole::System) {
            entries.push(ConversationEntry::ConversationMessage {
                agent_id: agent_id.clone(),
                timestamp: now,
                source: MessageSource::System,
                text: text.to_owned(),
                attachments: Vec::new(),
                source_context: None,
            });
        }
        entries
    }

    fn project_log_entry(
        &self,
        agent_id: &AgentId,
        event: &RuntimeSessionEvent,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Vec<ConversationEntry> {
        let Some((kind, text)) = log_kind_and_text(event) else {
            return Vec::new();
        };
        let entry = ConversationEntry::ConversationLog {
            agent_id: agent_id.clone(),
            timestamp: now,
            kind,
            text,
        };
        let Some(key) = entry.dedup_key() else {
            return vec![entry];
        };
        if self.dedup.lock().admit(key) {
            vec![entry]
        } else {
            Vec::new()
        }
    }
}

fn log_kind_and_text(event: &RuntimeSessionEvent) -> Option<(RuntimeLogKind, String)> {
    match event {
        RuntimeSessionEvent::MessageStart { .. } => {
            Some((RuntimeLogKind::MessageStart, "message started".to_owned()))
        }
        RuntimeSessionEvent::MessageEnd { text, .. } => {
            Some((RuntimeLogKind::MessageEnd, text.clone()))
        }
        RuntimeSessionEvent::ToolExecutionStart { tool_name, .. } => {
            Some((RuntimeLogKind::ToolExecutionStart, tool_name.clone()))
        }
        RuntimeSessionEvent::ToolExecutionUpdate { tool_name, delta, .. } => Some((
            RuntimeLogKind::ToolExecutionUpdate,
            format!("{tool_name}: {delta}"),
        )),
        RuntimeSessionEvent::ToolExecutionEnd { tool_name, is_error, .. } => Some((
            RuntimeLogKind::ToolExecutionEnd,
            format!("{tool_name} ({})", if *is_error { "error" } else { "ok" }),
        )),
        _ => None,
    }
}

fn diagnose_failure(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("context") || lower.contains("token") || lower.contains("overflow") {
        format!("Manager turn ended: context window exceeded ({message})")
    } else {
        format!("Manager turn ended with an error: {message}")
    }
}

/// Build the `conversation_message{source=user_input}` entry
/// `handleUserMessage` emits immediately, before routing downstream.
#[must_use]
pub fn user_input_entry(
    agent_id: &AgentId,
    text: &str,
    attachments: Vec<Attachment>,
    channel: Channel,
) -> ConversationEntry {
    ConversationEntry::ConversationMessage {
        agent_id: agent_id.clone(),
        timestamp: chrono::Utc::now(),
        source: MessageSource::UserInput,
        text: text.to_owned(),
        attachments,
        source_context: Some(SourceContext {
            channel,
            channel_id: None,
            user_id: None,
            message_id: None,
            thread_id: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str) -> AgentId {
        AgentId::parse(id).unwrap()
    }

    fn web_user_message(text: &str) -> ConversationEntry {
        ConversationEntry::ConversationMessage {
            agent_id: agent("a"),
            timestamp: chrono::Utc::now(),
            source: MessageSource::UserInput,
            text: text.to_owned(),
            attachments: Vec::new(),
            source_context: Some(SourceContext {
                channel: Channel::Web,
                channel_id: None,
                user_id: None,
                message_id: None,
                thread_id: None,
            }),
        }
    }

    fn log_entry(text: &str) -> ConversationEntry {
        ConversationEntry::ConversationLog {
            agent_id: agent("a"),
            timestamp: chrono::Utc::now(),
            kind: RuntimeLogKind::ToolExecutionStart,
            text: text.to_owned(),
        }
    }

    #[test]
    fn ring_under_capacity_keeps_everything() {
        let mut ring = ConversationRing::new(10);
        ring.push(log_entry("a"));
        ring.push(web_user_message("b"));
        assert_eq!(ring.snapshot().len(), 2);
    }

    #[test]
    fn ring_evicts_non_preserved_before_preserved() {
        let mut ring = ConversationRing::new(2);
        ring.push(web_user_message("keep me"));
        ring.push(log_entry("noisy"));
        ring.push(log_entry("even noisier"));

        let snapshot = ring.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|e| e.is_preserved()), "the web message must survive");
        assert!(!snapshot.iter().any(|e| matches!(e, ConversationEntry::ConversationLog { text, .. } if text == "noisy")));
    }

    #[test]
    fn ring_falls_back_to_oldest_preserved_once_all_are_preserved() {
        let mut ring = ConversationRing::new(2);
        ring.push(web_user_message("first"));
        ring.push(web_user_message("second"));
        ring.push(web_user_message("third"));

        let snapshot = ring.snapshot();
        assert_eq!(snapshot.len(), 2);
        match &snapshot[0] {
            ConversationEntry::ConversationMessage { text, .. } => assert_eq!(text, "second"),
            other => panic!("expected ConversationMessage, got {other:?}"),
        }
    }

    #[test]
    fn worker_assistant_message_end_becomes_conversation_message() {
        let projector = ConversationProjector::new(100);
        let entries = projector.project(
            &agent("worker-1"),
            false,
            &RuntimeSessionEvent::MessageEnd {
                item_id: "m1".into(),
                role: MessageRole::Assistant,
                text: "done".into(),
                is_error: false,
            },
        );
        assert!(entries.iter().any(|e| matches!(
            e,
            ConversationEntry::ConversationMessage { source: MessageSource::System, .. }
        )));
    }

    #[test]
    fn manager_assistant_message_end_is_not_user_visible() {
        let projector = ConversationProjector::new(100);
        let entries = projector.project(
            &agent("mgr"),
            true,
            &RuntimeSessionEvent::MessageEnd {
                item_id: "m1".into(),
                role: MessageRole::Assistant,
                text: "internal reasoning".into(),
                is_error: false,
            },
        );
        assert!(!entries
            .iter()
            .any(|e| matches!(e, ConversationEntry::ConversationMessage { .. })));
    }

    #[test]
    fn manager_speak_to_user_buffers_then_flushes_on_completion() {
        let projector = ConversationProjector::new(100);
        let started = projector.project(
            &agent("mgr"),
            true,
            &RuntimeSessionEvent::ToolExecutionUpdate {
                item_id: "t1".into(),
                tool_name: SPEAK_TO_USER_TOOL.into(),
                delta: "hello ".into(),
            },
        );
        assert!(started.is_empty());

        let more = projector.project(
            &agent("mgr"),
            true,
            &RuntimeSessionEvent::ToolExecutionUpdate {
                item_id: "t1".into(),
                tool_name: SPEAK_TO_USER_TOOL.into(),
                delta: "world".into(),
            },
        );
        assert!(more.is_empty());

        let completed = projector.project(
            &agent("mgr"),
            true,
            &RuntimeSessionEvent::ToolExecutionEnd {
                item_id: "t1".into(),
                tool_name: SPEAK_TO_USER_TOOL.into(),
                is_error: false,
            },
        );
        assert_eq!(completed.len(), 1);
        match &completed[0] {
            ConversationEntry::ConversationMessage { text, source, .. } => {
                assert_eq!(text, "hello world");
                assert_eq!(*source, MessageSource::SpeakToUser);
            }
            other => panic!("expected ConversationMessage, got {other:?}"),
        }
    }

    #[test]
    fn manager_agent_end_error_is_diagnosed() {
        let projector = ConversationProjector::new(100);
        let entries = projector.project(
            &agent("mgr"),
            true,
            &RuntimeSessionEvent::AgentEnd {
                error: Some("context window exceeded at 128000 tokens".into()),
            },
        );
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            ConversationEntry::ConversationMessage { text, .. } => {
                assert!(text.contains("context window exceeded"));
            }
            other => panic!("expected ConversationMessage, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_log_entries_are_deduped() {
        let projector = ConversationProjector::new(100);
        let event = RuntimeSessionEvent::ToolExecutionStart {
            item_id: "t1".into(),
            tool_name: "command_execution".into(),
        };
        let first = projector.project(&agent("worker-1"), false, &event);
        let second = projector.project(&agent("worker-1"), false, &event);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0, "identical event within the same instant is a duplicate");
    }

    #[test]
    fn turn_start_produces_no_entry() {
        let projector = ConversationProjector::new(100);
        let entries = projector.project(
            &agent("worker-1"),
            false,
            &RuntimeSessionEvent::TurnStart { turn_id: "t1".into() },
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn diagnose_failure_distinguishes_context_overflow() {
        assert!(diagnose_failure("token budget exceeded").contains("context window exceeded"));
        assert!(diagnose_failure("network error").contains("ended with an error"));
    }
}
