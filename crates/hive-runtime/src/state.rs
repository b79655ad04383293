//! The runtime's mutable state machine: `Idle -> Starting -> Streaming ->
//! Idle`, plus the absorbing `Terminated` state.
//!
//! All fields live behind a single `tokio::sync::Mutex` (see
//! `AgentRuntime`) rather than split into several locks, so that a
//! transition and its queue bookkeeping always happen atomically relative
//! to any other caller of `sendMessage`/`handleNotification`.

use std::collections::{HashMap, VecDeque};

use hive_core::model::{PendingDelivery, QueuedSteer};

/// The runtime's externally visible lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeStatus {
    Idle,
    Starting,
    Streaming,
    Terminated,
}

impl RuntimeStatus {
    #[must_use]
    pub fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Everything `AgentRuntime` needs to track between calls.
#[derive(Debug, Default)]
pub struct RuntimeState {
    pub status: Option<RuntimeStatus>,
    pub thread_id: Option<String>,
    pub active_turn_id: Option<String>,
    pub start_request_pending: bool,
    pub queued_steers: VecDeque<QueuedSteer>,
    pub pending_deliveries: Vec<PendingDelivery>,
    pub tool_name_by_item_id: HashMap<String, String>,
}

impl RuntimeState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: Some(RuntimeStatus::Idle),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn status(&self) -> RuntimeStatus {
        self.status.unwrap_or(RuntimeStatus::Idle)
    }

    /// Remove and return the pending delivery with the given `messageKey`,
    /// if any. Used to ack the correct delivery when the child echoes a
    /// `userMessage` item.
    pub fn take_pending_delivery(&mut self, message_key: &str) -> Option<PendingDelivery> {
        let idx = self
            .pending_deliveries
            .iter()
            .position(|d| d.message_key == message_key)?;
        Some(self.pending_deliveries.remove(idx))
    }

    /// Drop all queued steers and pending deliveries, e.g. on terminate.
    pub fn clear_queues(&mut self) {
        self.queued_steers.clear();
        self.pending_deliveries.clear();
        self.tool_name_by_item_id.clear();
    }
}
