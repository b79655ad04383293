//! The swarm-wide event bus: `agent_status`, `agents_snapshot`,
//! `conversation_message`, `conversation_log`, `conversation_reset`.
//! Semantics are last-writer-wins with no replay. Subscribers hydrate
//! via `SwarmManager::list_agents`/`conversation_history` on subscribe.

use hive_core::ids::AgentId;
use hive_core::model::{AgentDescriptor, AgentStatus, ConversationEntry};
use tokio::sync::broadcast;

const EVENT_BUS_CAPACITY: usize = 1024;

/// Why a manager's session was reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReason {
    UserNewCommand,
    ApiReset,
}

/// One event published on the swarm-wide bus.
#[derive(Clone, Debug)]
pub enum SwarmEvent {
    AgentStatus { agent_id: AgentId, status: AgentStatus },
    AgentsSnapshot { agents: Vec<AgentDescriptor> },
    ConversationMessage(ConversationEntry),
    ConversationLog(ConversationEntry),
    ConversationReset { agent_id: AgentId, reason: ResetReason },
}

/// Thin wrapper around a `broadcast` channel; emits are best-effort (no
/// receivers is not an error).
pub struct EventBus {
    tx: broadcast::Sender<SwarmEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SwarmEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(SwarmEvent::ConversationReset {
            agent_id: AgentId::parse("mgr").unwrap(),
            reason: ResetReason::ApiReset,
        });
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(SwarmEvent::AgentStatus {
            agent_id: AgentId::parse("mgr").unwrap(),
            status: AgentStatus::Idle,
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SwarmEvent::AgentStatus { .. }));
    }
}
