//! `AgentRuntime`: drives one child coding-agent process through its
//! deterministic boot sequence, then translates `sendMessage` calls into
//! turns/steers and inbound child notifications into normalized session
//! events.
//!
//! Inbound child frames arrive on `hive_rpc::RpcCallbacks`, which are plain
//! synchronous closures. Rather than block the stdout-reader task on an
//! async state-machine step, the callbacks push onto an unbounded channel
//! and a single dedicated task drains it, applying transitions one at a
//! time against `state` under its `tokio::sync::Mutex` — the same
//! single-reader-task shape `hive_rpc::JsonRpcClient` itself uses for
//! stdout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, warn};

use hive_core::ids::{AgentId, DeliveryId};
use hive_core::model::{Attachment, MessageRole, RuntimeSessionEvent};
use hive_rpc::{JsonRpcClient, RequestOutcome, RpcCallbacks, RpcError};
use hive_session::{SessionRecord, SessionStore};

use crate::callbacks::{RuntimeCallbacks, RuntimeErrorEvent};
use crate::delivery::{message_key, DeliveryMode, ResolvedMode, SendReceipt};
use crate::errors::{BootPhase, RuntimeError};
use crate::state::{RuntimeState, RuntimeStatus};

type Result<T> = std::result::Result<T, RuntimeError>;

const THREAD_ID_CUSTOM_TYPE: &str = "thread_id";
const DEFAULT_RPC_TIMEOUT_MS: u64 = 30_000;

/// Configuration needed to boot one runtime instance.
pub struct RuntimeConfig {
    pub agent_id: AgentId,
    pub child_binary: String,
    pub child_args: Vec<String>,
    pub cwd: PathBuf,
    pub envs: HashMap<String, String>,
    pub developer_instructions: String,
    pub rpc_timeout_ms: u64,
}

/// Frames the background event loop processes one at a time.
enum InboundEvent {
    Notification { method: String, params: Option<Value> },
    Exit(Option<RpcError>),
}

/// A single agent's child process plus its turn/steer state machine.
pub struct AgentRuntime {
    agent_id: AgentId,
    config_cwd: PathBuf,
    rpc_timeout_ms: u64,
    client: Arc<JsonRpcClient>,
    state: AsyncMutex<RuntimeState>,
    session: AsyncMutex<SessionStore>,
    callbacks: RuntimeCallbacks,
}

impl AgentRuntime {
    /// Spawn the child process, run the deterministic boot sequence, and
    /// return a runtime ready to accept `send_message` calls.
    pub async fn boot(
        config: RuntimeConfig,
        session: SessionStore,
        callbacks: RuntimeCallbacks,
    ) -> Result<Arc<Self>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let agent_id_for_log = config.agent_id.clone();

        let rpc_callbacks = RpcCallbacks {
            on_notification: Arc::new({
                let tx = tx.clone();
                move |method, params| {
                    let _ = tx.send(InboundEvent::Notification { method, params });
                }
            }),
            on_request: Arc::new(Self::handle_inbound_request),
            on_exit: Arc::new({
                let tx = tx.clone();
                move |err| {
                    let _ = tx.send(InboundEvent::Exit(err));
                }
            }),
            on_stderr: Arc::new({
                let agent_id = agent_id_for_log.clone();
                move |line| debug!(%agent_id, child_stderr = %line)
            }),
        };

        let client = JsonRpcClient::spawn(
            &config.child_binary,
            &config.child_args,
            Some(&config.cwd),
            &config.envs,
            rpc_callbacks,
        )
        .await
        .map_err(|e| RuntimeError::Startup {
            phase: BootPhase::Initialize,
            message: e.to_string(),
        })?;

        let runtime = Arc::new(Self {
            agent_id: config.agent_id,
            config_cwd: config.cwd,
            rpc_timeout_ms: if config.rpc_timeout_ms == 0 {
                DEFAULT_RPC_TIMEOUT_MS
            } else {
                config.rpc_timeout_ms
            },
            client,
            state: AsyncMutex::new(RuntimeState::new()),
            session: AsyncMutex::new(session),
            callbacks,
        });

        tokio::spawn(Self::run_event_loop(Arc::clone(&runtime), rx));

        runtime.run_boot_sequence(&config.developer_instructions).await?;
        Ok(runtime)
    }

    /// Current lifecycle status.
    pub async fn status(&self) -> RuntimeStatus {
        self.state.lock().await.status()
    }

    async fn run_boot_sequence(&self, developer_instructions: &str) -> Result<()> {
        self.client
            .request(
                "initialize",
                Some(json!({"clientInfo": {"name": "hive", "version": env!("CARGO_PKG_VERSION")}})),
                self.rpc_timeout_ms,
            )
            .await
            .map_err(|e| self.startup_err(BootPhase::Initialize, e))?;

        self.client
            .notify("initialized", None)
            .await
            .map_err(|e| self.startup_err(BootPhase::Initialize, e))?;

        self.ensure_authenticated().await?;
        self.bootstrap_thread(developer_instructions).await?;
        Ok(())
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        let read = self
            .client
            .request("account/read", Some(json!({})), self.rpc_timeout_ms)
            .await
            .map_err(|e| self.startup_err(BootPhase::Authentication, e))?;

        let requires_auth = read
            .get("requiresOpenaiAuth")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !requires_auth {
            return Ok(());
        }

        let api_key = std::env::var("CODEX_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        self.client
            .request(
                "account/login/start",
                Some(json!({"apiKey": api_key})),
                self.rpc_timeout_ms,
            )
            .await
            .map_err(|e| self.startup_err(BootPhase::Authentication, e))?;

        let recheck = self
            .client
            .request("account/read", Some(json!({})), self.rpc_timeout_ms)
            .await
            .map_err(|e| self.startup_err(BootPhase::Authentication, e))?;

        let still_requires_auth = recheck
            .get("requiresOpenaiAuth")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if still_requires_auth {
            return Err(RuntimeError::AuthenticationRequired(
                "child process remained unauthenticated after login/start".into(),
            ));
        }
        Ok(())
    }

    async fn bootstrap_thread(&self, developer_instructions: &str) -> Result<()> {
        let persisted_thread_id = {
            let session = self.session.lock().await;
            session
                .latest_custom(THREAD_ID_CUSTOM_TYPE)
                .map_err(|e| RuntimeError::Internal(e.to_string()))?
                .and_then(|v| v.get("threadId").and_then(Value::as_str).map(str::to_owned))
        };

        let thread_id = if let Some(thread_id) = persisted_thread_id {
            match self
                .client
                .request(
                    "thread/resume",
                    Some(json!({
                        "threadId": thread_id,
                        "cwd": self.config_cwd,
                        "developerInstructions": developer_instructions,
                    })),
                    self.rpc_timeout_ms,
                )
                .await
            {
                Ok(result) => result
                    .get("thread")
                    .and_then(|t| t.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                Err(err) => {
                    warn!(agent_id = %self.agent_id, %err, "thread/resume failed, starting fresh thread");
                    None
                }
            }
        } else {
            None
        };

        let thread_id = match thread_id {
            Some(id) => id,
            None => {
                let started = self
                    .client
                    .request(
                        "thread/start",
                        Some(json!({
                            "cwd": self.config_cwd,
                            "developerInstructions": developer_instructions,
                        })),
                        self.rpc_timeout_ms,
                    )
                    .await
                    .map_err(|e| self.startup_err(BootPhase::ThreadBootstrap, e))?;
                started
                    .get("thread")
                    .and_then(|t| t.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or(RuntimeError::MissingThreadId)?
            }
        };

        {
            let mut session = self.session.lock().await;
            session
                .append(&SessionRecord::custom(
                    THREAD_ID_CUSTOM_TYPE,
                    json!({"threadId": thread_id}),
                ))
                .map_err(|e| RuntimeError::Internal(e.to_string()))?;
        }
        self.state.lock().await.thread_id = Some(thread_id);
        Ok(())
    }

    fn startup_err(&self, phase: BootPhase, err: RpcError) -> RuntimeError {
        RuntimeError::Startup {
            phase,
            message: err.to_string(),
        }
    }

    /// Deliver `text`/`attachments` per `requested_mode`, resolving `auto`
    /// and `follow_up` against current status.
    pub async fn send_message(
        &self,
        text: &str,
        attachments: &[Attachment],
        requested_mode: DeliveryMode,
    ) -> Result<SendReceipt> {
        let key = message_key(text, attachments);
        let delivery_id = DeliveryId::new();

        let mut state = self.state.lock().await;
        if state.status().is_terminated() {
            return Err(RuntimeError::Terminated);
        }

        let resolved = match requested_mode {
            DeliveryMode::Prompt => ResolvedMode::Prompt,
            DeliveryMode::Steer => ResolvedMode::Steer,
            DeliveryMode::Auto | DeliveryMode::FollowUp => {
                if state.status() == RuntimeStatus::Idle {
                    ResolvedMode::Prompt
                } else {
                    ResolvedMode::Steer
                }
            }
        };

        if resolved == ResolvedMode::Prompt && state.status() != RuntimeStatus::Idle {
            return Err(RuntimeError::Internal(
                "prompt delivery requested while runtime is not idle".into(),
            ));
        }

        match resolved {
            ResolvedMode::Prompt => {
                state.start_request_pending = true;
                state.status = Some(RuntimeStatus::Starting);
                let thread_id = state.thread_id.clone();
                drop(state);
                self.callbacks.emit_status_change(RuntimeStatus::Starting);

                let input = build_text_input(text, attachments);
                let result = self
                    .client
                    .request(
                        "turn/start",
                        Some(json!({
                            "threadId": thread_id,
                            "cwd": self.config_cwd,
                            "input": input,
                        })),
                        self.rpc_timeout_ms,
                    )
                    .await;

                match result {
                    Ok(value) => {
                        let mut state = self.state.lock().await;
                        state.start_request_pending = false;
                        let turn_started = if let Some(turn_id) = value
                            .get("turn")
                            .and_then(|t| t.get("id"))
                            .and_then(Value::as_str)
                        {
                            state.active_turn_id = Some(turn_id.to_owned());
                            state.status = Some(RuntimeStatus::Streaming);
                            true
                        } else {
                            false
                        };
                        state.pending_deliveries.push(hive_core::model::PendingDelivery {
                            delivery_id: delivery_id.clone(),
                            message_key: key,
                        });
                        drop(state);
                        if turn_started {
                            self.flush_steers().await;
                            self.callbacks.emit_status_change(RuntimeStatus::Streaming);
                        }
                    }
                    Err(err) => {
                        self.recover_from_turn_failure("prompt_start", &err.to_string())
                            .await;
                        return Err(RuntimeError::TurnStartFailed(err.to_string()));
                    }
                }
            }
            ResolvedMode::Steer => {
                state.queued_steers.push_back(hive_core::model::QueuedSteer {
                    delivery_id: delivery_id.clone(),
                    message: text.to_owned(),
                });
                state.pending_deliveries.push(hive_core::model::PendingDelivery {
                    delivery_id: delivery_id.clone(),
                    message_key: key,
                });
                let should_flush = state.active_turn_id.is_some();
                drop(state);
                if should_flush {
                    self.flush_steers().await;
                }
            }
        }

        Ok(SendReceipt {
            delivery_id,
            mode: resolved,
        })
    }

    /// Ask the child to compact the active thread's context, optionally
    /// steered by `custom_instructions`. Distinct from `send_message`: this
    /// doesn't start or steer a turn, it rewrites the thread in place.
    pub async fn compact(&self, custom_instructions: Option<&str>) -> Result<()> {
        let thread_id = self.state.lock().await.thread_id.clone();
        self.client
            .request(
                "thread/compact",
                Some(json!({
                    "threadId": thread_id,
                    "customInstructions": custom_instructions,
                })),
                self.rpc_timeout_ms,
            )
            .await
            .map_err(|e| RuntimeError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn flush_steers(&self) {
        loop {
            let (thread_id, turn_id, next) = {
                let state = self.state.lock().await;
                let Some(turn_id) = state.active_turn_id.clone() else {
                    return;
                };
                let Some(next) = state.queued_steers.front().cloned() else {
                    return;
                };
                (state.thread_id.clone(), turn_id, next)
            };

            let result = self
                .client
                .request(
                    "turn/steer",
                    Some(json!({
                        "threadId": thread_id,
                        "expectedTurnId": turn_id,
                        "input": build_text_input(&next.message, &[]),
                    })),
                    self.rpc_timeout_ms,
                )
                .await;

            match result {
                Ok(_) => {
                    let mut state = self.state.lock().await;
                    if state.queued_steers.front().map(|s| &s.delivery_id) == Some(&next.delivery_id) {
                        state.queued_steers.pop_front();
                    }
                }
                Err(err) => {
                    self.recover_from_turn_failure("steer", &err.to_string()).await;
                    return;
                }
            }
        }
    }

    async fn recover_from_turn_failure(&self, phase: &'static str, message: &str) {
        {
            let mut state = self.state.lock().await;
            state.active_turn_id = None;
            state.start_request_pending = false;
            state.status = Some(RuntimeStatus::Idle);
        }
        self.callbacks.emit_session_event(RuntimeSessionEvent::TurnEnd);
        self.callbacks
            .emit_session_event(RuntimeSessionEvent::AgentEnd {
                error: Some(message.to_owned()),
            });
        self.callbacks.emit_status_change(RuntimeStatus::Idle);
        self.callbacks.emit_runtime_error(RuntimeErrorEvent {
            phase,
            message: message.to_owned(),
            recoverable: true,
        });
    }

    /// Best-effort interrupt (if a turn is active) plus queue clear,
    /// returning the runtime to `Idle` without disposing the child.
    pub async fn stop_in_flight(&self, abort: bool) {
        self.interrupt_and_clear(abort).await;
        let mut state = self.state.lock().await;
        state.status = Some(RuntimeStatus::Idle);
        drop(state);
        self.callbacks.emit_status_change(RuntimeStatus::Idle);
    }

    /// Terminate the runtime: best-effort interrupt, dispose the child,
    /// clear all queues, and transition to `Terminated`.
    pub async fn terminate(&self, abort: bool) {
        self.interrupt_and_clear(abort).await;
        self.client.dispose().await;
        let mut state = self.state.lock().await;
        state.status = Some(RuntimeStatus::Terminated);
        drop(state);
        self.callbacks.emit_status_change(RuntimeStatus::Terminated);
    }

    async fn interrupt_and_clear(&self, abort: bool) {
        let (thread_id, turn_id) = {
            let state = self.state.lock().await;
            (state.thread_id.clone(), state.active_turn_id.clone())
        };
        if abort {
            if let Some(turn_id) = turn_id {
                let _ = self
                    .client
                    .request(
                        "turn/interrupt",
                        Some(json!({"threadId": thread_id, "turnId": turn_id})),
                        self.rpc_timeout_ms,
                    )
                    .await;
            }
        }
        let mut state = self.state.lock().await;
        state.active_turn_id = None;
        state.clear_queues();
    }

    async fn run_event_loop(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                InboundEvent::Notification { method, params } => {
                    self.handle_notification(&method, params).await;
                }
                InboundEvent::Exit(err) => {
                    self.handle_child_exit(err).await;
                    break;
                }
            }
        }
    }

    async fn handle_notification(&self, method: &str, params: Option<Value>) {
        let params = params.unwrap_or(Value::Null);
        match method {
            "turn/started" => {
                let turn_id = params
                    .get("turn")
                    .and_then(|t| t.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                {
                    let mut state = self.state.lock().await;
                    state.active_turn_id = turn_id;
                    state.status = Some(RuntimeStatus::Streaming);
                }
                self.callbacks.emit_session_event(RuntimeSessionEvent::AgentStart);
                self.callbacks
                    .emit_session_event(RuntimeSessionEvent::TurnStart {
                        turn_id: params
                            .get("turn")
                            .and_then(|t| t.get("id"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned(),
                    });
                self.callbacks.emit_status_change(RuntimeStatus::Streaming);
                self.flush_steers().await;
            }
            "turn/completed" => {
                {
                    let mut state = self.state.lock().await;
                    state.active_turn_id = None;
                    state.start_request_pending = false;
                    state.status = Some(RuntimeStatus::Idle);
                }
                self.callbacks.emit_session_event(RuntimeSessionEvent::TurnEnd);
                self.callbacks
                    .emit_session_event(RuntimeSessionEvent::AgentEnd { error: None });
                self.callbacks.emit_status_change(RuntimeStatus::Idle);
                self.callbacks.emit_agent_end();
            }
            "item/started" => self.handle_item_started(&params).await,
            "item/completed" => self.handle_item_completed(&params).await,
            "item/agentMessage/delta" => {
                let delta = params.get("delta").and_then(Value::as_str).unwrap_or_default();
                let item_id = params.get("itemId").and_then(Value::as_str).unwrap_or_default();
                self.callbacks
                    .emit_session_event(RuntimeSessionEvent::MessageUpdate {
                        item_id: item_id.to_owned(),
                        role: MessageRole::Assistant,
                        delta: delta.to_owned(),
                    });
            }
            other if other.ends_with("/outputDelta") => {
                let item_id = params.get("itemId").and_then(Value::as_str).unwrap_or_default();
                let delta = params.get("delta").and_then(Value::as_str).unwrap_or_default();
                let tool_name = self
                    .state
                    .lock()
                    .await
                    .tool_name_by_item_id
                    .get(item_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_owned());
                self.callbacks
                    .emit_session_event(RuntimeSessionEvent::ToolExecutionUpdate {
                        item_id: item_id.to_owned(),
                        tool_name,
                        delta: delta.to_owned(),
                    });
            }
            other => {
                debug!(agent_id = %self.agent_id, method = %other, "unhandled child notification");
            }
        }
    }

    async fn handle_item_started(&self, params: &Value) {
        let item = params.get("item").cloned().unwrap_or(Value::Null);
        let item_id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_owned();
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();

        if item_type == "userMessage" {
            let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
            let key = message_key(text, &[]);
            let mut state = self.state.lock().await;
            let _ = state.take_pending_delivery(&key);
            return;
        }

        if item_type == "agentMessage" {
            self.callbacks
                .emit_session_event(RuntimeSessionEvent::MessageStart {
                    item_id,
                    role: MessageRole::Assistant,
                });
            return;
        }

        let tool_name = normalize_tool_item(item_type, &item);
        self.state
            .lock()
            .await
            .tool_name_by_item_id
            .insert(item_id.clone(), tool_name.clone());
        self.callbacks
            .emit_session_event(RuntimeSessionEvent::ToolExecutionStart { item_id, tool_name });
    }

    async fn handle_item_completed(&self, params: &Value) {
        let item = params.get("item").cloned().unwrap_or(Value::Null);
        let item_id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_owned();
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
        let status = item.get("status").and_then(Value::as_str).unwrap_or_default();
        let is_error = matches!(status, "failed" | "declined");

        if item_type == "agentMessage" {
            let text = item.get("text").and_then(Value::as_str).unwrap_or_default().to_owned();
            self.callbacks
                .emit_session_event(RuntimeSessionEvent::MessageEnd {
                    item_id,
                    role: MessageRole::Assistant,
                    text,
                    is_error,
                });
            return;
        }

        let tool_name = self
            .state
            .lock()
            .await
            .tool_name_by_item_id
            .remove(&item_id)
            .unwrap_or_else(|| normalize_tool_item(item_type, &item));
        self.callbacks
            .emit_session_event(RuntimeSessionEvent::ToolExecutionEnd {
                item_id,
                tool_name,
                is_error,
            });
    }

    async fn handle_child_exit(&self, err: Option<RpcError>) {
        let message = err.map(|e| e.to_string()).unwrap_or_else(|| "child exited".to_owned());
        {
            let mut state = self.state.lock().await;
            state.status = Some(RuntimeStatus::Terminated);
            state.active_turn_id = None;
            state.clear_queues();
        }
        self.callbacks
            .emit_session_event(RuntimeSessionEvent::ToolExecutionEnd {
                item_id: String::new(),
                tool_name: "runtime".to_owned(),
                is_error: true,
            });
        self.callbacks.emit_status_change(RuntimeStatus::Terminated);
        self.callbacks.emit_runtime_error(RuntimeErrorEvent {
            phase: "runtime_exit",
            message,
            recoverable: false,
        });
    }

    fn handle_inbound_request(method: &str, params: Option<Value>) -> RequestOutcome {
        let _ = params;
        match method {
            "item/commandExecution/requestApproval" | "item/fileChange/requestApproval" => {
                RequestOutcome::Ok(json!({"decision": "accept"}))
            }
            "item/tool/requestUserInput" => RequestOutcome::Ok(json!({"answer": ""})),
            "item/tool/call" => RequestOutcome::Failed("no tool bridge configured".into()),
            _ => RequestOutcome::MethodNotFound,
        }
    }
}

fn build_text_input(text: &str, attachments: &[Attachment]) -> Vec<Value> {
    let mut input = vec![json!({"type": "text", "text": text})];
    for attachment in attachments {
        if let Attachment::Image { mime, base64 } = attachment {
            input.push(json!({"type": "image", "url": format!("data:{mime};base64,{base64}")}));
        }
    }
    input
}

fn normalize_tool_item(item_type: &str, item: &Value) -> String {
    match item_type {
        "commandExecution" => "command_execution".to_owned(),
        "fileChange" => "file_change".to_owned(),
        "mcpToolCall" => {
            let server = item.get("server").and_then(Value::as_str).unwrap_or("unknown");
            let tool = item.get("tool").and_then(Value::as_str).unwrap_or("unknown");
            format!("mcp:{server}/{tool}")
        }
        "collabAgentToolCall" => {
            let tool = item.get("tool").and_then(Value::as_str).unwrap_or("unknown");
            format!("collab:{tool}")
        }
        "webSearch" => "web_search".to_owned(),
        "imageView" => "image_view".to_owned(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_text_input_includes_images() {
        let attachments = vec![Attachment::Image {
            mime: "image/png".into(),
            base64: "Zm9v".into(),
        }];
        let input = build_text_input("hi", &attachments);
        assert_eq!(input.len(), 2);
        assert_eq!(input[0]["type"], "text");
        assert_eq!(input[1]["type"], "image");
    }

    #[test]
    fn build_text_input_skips_non_image_attachments() {
        let attachments = vec![Attachment::Text {
            file_name: "a.txt".into(),
            content: "hi".into(),
        }];
        assert_eq!(build_text_input("hi", &attachments).len(), 1);
    }

    #[test]
    fn normalize_tool_item_maps_known_kinds() {
        assert_eq!(normalize_tool_item("commandExecution", &json!({})), "command_execution");
        assert_eq!(normalize_tool_item("fileChange", &json!({})), "file_change");
        assert_eq!(normalize_tool_item("webSearch", &json!({})), "web_search");
        assert_eq!(normalize_tool_item("imageView", &json!({})), "image_view");
        assert_eq!(
            normalize_tool_item("mcpToolCall", &json!({"server": "git", "tool": "status"})),
            "mcp:git/status"
        );
        assert_eq!(
            normalize_tool_item("collabAgentToolCall", &json!({"tool": "spawn"})),
            "collab:spawn"
        );
    }

    #[test]
    fn unknown_tool_item_passes_through() {
        assert_eq!(normalize_tool_item("somethingNew", &json!({})), "somethingNew");
    }

    #[test]
    fn inbound_request_approves_command_execution() {
        let outcome = AgentRuntime::handle_inbound_request(
            "item/commandExecution/requestApproval",
            None,
        );
        assert!(matches!(outcome, RequestOutcome::Ok(_)));
    }

    #[test]
    fn inbound_request_unknown_method_not_found() {
        let outcome = AgentRuntime::handle_inbound_request("totally/unknown", None);
        assert!(matches!(outcome, RequestOutcome::MethodNotFound));
    }

    #[test]
    fn inbound_request_tool_call_without_bridge_fails() {
        let outcome = AgentRuntime::handle_inbound_request("item/tool/call", None);
        assert!(matches!(outcome, RequestOutcome::Failed(_)));
    }
}
