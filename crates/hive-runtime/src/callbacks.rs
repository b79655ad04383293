//! Callback hooks an `AgentRuntime` invokes as it drives a single agent.
//!
//! Generalizes the broadcast-based event emitter idiom used elsewhere in
//! this codebase into a small set of named, optional hooks — a runtime
//! embedder (e.g. the swarm layer) typically only cares about a subset of
//! these, so every field defaults to `None` rather than requiring a
//! no-op implementation of all of them.

use std::fmt;
use std::sync::Arc;

use hive_core::model::RuntimeSessionEvent;

use crate::state::RuntimeStatus;

type Hook<Args> = Arc<dyn Fn(Args) + Send + Sync>;

/// Named callbacks an `AgentRuntime` caller may register.
#[derive(Clone, Default)]
pub struct RuntimeCallbacks {
    /// Invoked once per normalized session event, in the order they're
    /// produced. This is the primary feed for conversation projection.
    pub on_session_event: Option<Hook<RuntimeSessionEvent>>,
    /// Invoked exactly once when a turn finishes (`turn/completed`), after
    /// the `turn_end`/`agent_end` session events have already been emitted.
    pub on_agent_end: Option<Hook<()>>,
    /// Invoked whenever the runtime hits a recoverable or unrecoverable
    /// error, including synthetic `runtime_exit` failures. `phase` is
    /// `RuntimeError::category()`.
    pub on_runtime_error: Option<Hook<RuntimeErrorEvent>>,
    /// Invoked whenever `status` changes.
    pub on_status_change: Option<Hook<RuntimeStatus>>,
}

/// Payload passed to `on_runtime_error`.
#[derive(Clone, Debug)]
pub struct RuntimeErrorEvent {
    pub phase: &'static str,
    pub message: String,
    pub recoverable: bool,
}

impl fmt::Debug for RuntimeCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeCallbacks")
            .field("on_session_event", &self.on_session_event.is_some())
            .field("on_agent_end", &self.on_agent_end.is_some())
            .field("on_runtime_error", &self.on_runtime_error.is_some())
            .field("on_status_change", &self.on_status_change.is_some())
            .finish()
    }
}

impl RuntimeCallbacks {
    pub(crate) fn emit_session_event(&self, event: RuntimeSessionEvent) {
        if let Some(hook) = &self.on_session_event {
            hook(event);
        }
    }

    pub(crate) fn emit_agent_end(&self) {
        if let Some(hook) = &self.on_agent_end {
            hook(());
        }
    }

    pub(crate) fn emit_runtime_error(&self, event: RuntimeErrorEvent) {
        if let Some(hook) = &self.on_runtime_error {
            hook(event);
        }
    }

    pub(crate) fn emit_status_change(&self, status: RuntimeStatus) {
        if let Some(hook) = &self.on_status_change {
            hook(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unset_hooks_are_no_ops() {
        let callbacks = RuntimeCallbacks::default();
        callbacks.emit_session_event(RuntimeSessionEvent::AgentStart);
        callbacks.emit_agent_end();
        callbacks.emit_runtime_error(RuntimeErrorEvent {
            phase: "startup",
            message: "x".into(),
            recoverable: false,
        });
        callbacks.emit_status_change(RuntimeStatus::Idle);
    }

    #[test]
    fn session_event_hook_fires() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let mut callbacks = RuntimeCallbacks::default();
        callbacks.on_session_event = Some(Arc::new(move |_event| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        callbacks.emit_session_event(RuntimeSessionEvent::TurnEnd);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_change_hook_receives_value() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        let mut callbacks = RuntimeCallbacks::default();
        callbacks.on_status_change = Some(Arc::new(move |status| {
            *seen2.lock().unwrap() = Some(status);
        }));
        callbacks.emit_status_change(RuntimeStatus::Streaming);
        assert_eq!(*seen.lock().unwrap(), Some(RuntimeStatus::Streaming));
    }
}
