//! `SwarmManager`: the single source of truth for the agent tree and the
//! sole writer of `agents.json`. Follows an allocate-validate-create shape:
//! reserve an id, validate the spawn request against policy, then create
//! and persist the descriptor, generalized here to a manager/worker
//! descriptor tree with persisted state.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

use hive_core::collab::{ArchetypePromptRegistry, CwdPolicy};
use hive_core::ids::{AgentId, BatchId};
use hive_core::model::{
    sort_key, AgentDescriptor, AgentRole, AgentStatus, Attachment, Channel, ConversationEntry,
    ModelSelector, RuntimeSessionEvent, SourceContext,
};
use hive_runtime::{
    AgentRuntime, DeliveryMode, RuntimeCallbacks, RuntimeConfig, RuntimeErrorEvent, RuntimeError,
    RuntimeStatus, SendReceipt,
};
use hive_session::{SessionRecord, SessionStore};
use hive_settings::HiveSettings;

use crate::errors::{Result, SwarmError};
use crate::events::{EventBus, ResetReason, SwarmEvent};
use crate::projector::{self, ConversationProjector, ConversationRing};
use crate::store::AgentStore;

const DEFAULT_WORKER_PROMPT: &str =
    "You are a worker agent completing a task assigned by your manager. Report results back concisely.";
const CONVERSATION_ENTRY_CUSTOM_TYPE: &str = "conversation_entry";

/// Wiring `SwarmManager::new` needs; the rest of its state is computed.
pub struct SwarmManagerConfig {
    pub settings: HiveSettings,
    pub primary_manager_id: AgentId,
    pub child_args: Vec<String>,
    /// `secrets.json` contents, used to hydrate every spawned child's
    /// environment on boot.
    pub secrets: HashMap<String, String>,
}

/// Who/what triggered an outbound `sendMessage`, controlling the
/// `SYSTEM:` prefix rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOrigin {
    User,
    Internal,
}

/// Optional inputs to `sendMessage` beyond sender/target/text/delivery.
#[derive(Default)]
pub struct SendOptions {
    pub attachments: Vec<Attachment>,
}

/// An attachment as a caller first hands it over, before binary payloads
/// have been staged to disk under `attachments_dir`. `Text`/`Image` map
/// straight onto `Attachment`; `Binary` carries raw bytes instead of the
/// `absolutePath` that only exists once `stage_attachments` has written them.
pub enum RawAttachment {
    Text { file_name: String, content: String },
    Binary { file_name: String, mime: String, bytes: Vec<u8> },
    Image { mime: String, base64: String },
}

pub struct SpawnAgentInput {
    pub agent_id: AgentId,
    pub display_name: String,
    pub cwd: String,
    pub model: Option<ModelSelector>,
    pub archetype_id: Option<String>,
    pub system_prompt_override: Option<String>,
    pub initial_message: Option<String>,
}

pub struct CreateManagerInput {
    pub agent_id: AgentId,
    pub display_name: String,
    pub cwd: String,
    pub model: Option<ModelSelector>,
}

/// Options accepted by `handleUserMessage`.
#[derive(Default)]
pub struct HandleUserMessageOptions {
    pub target_agent_id: Option<AgentId>,
    pub source_context: Option<SourceContext>,
    pub attachments: Vec<Attachment>,
}

/// What `handleUserMessage` actually did.
#[derive(Debug)]
pub enum HandleUserMessageOutcome {
    /// The text was a `/compact` command; no turn was delivered.
    Compacted,
    Delivered(SendReceipt),
}

struct AgentEntry {
    descriptor: AgentDescriptor,
    runtime: Option<Arc<AgentRuntime>>,
    session: Arc<Mutex<SessionStore>>,
    conversation_ring: Arc<Mutex<ConversationRing>>,
}

pub struct SwarmManager {
    data_dir: PathBuf,
    sessions_dir: PathBuf,
    attachments_dir: PathBuf,
    primary_manager_id: AgentId,
    child_binary: String,
    child_args: Vec<String>,
    secrets: HashMap<String, String>,
    rpc_timeout_ms: u64,
    default_model: ModelSelector,
    conversation_ring_capacity: usize,
    cwd_policy: Arc<dyn CwdPolicy>,
    archetypes: Arc<dyn ArchetypePromptRegistry>,
    store: AgentStore,
    projector: ConversationProjector,
    events: EventBus,
    agents: Mutex<HashMap<AgentId, AgentEntry>>,
}

impl SwarmManager {
    #[must_use]
    pub fn new(
        config: SwarmManagerConfig,
        cwd_policy: Arc<dyn CwdPolicy>,
        archetypes: Arc<dyn ArchetypePromptRegistry>,
    ) -> Self {
        let data_dir = PathBuf::from(&config.settings.daemon.data_dir);
        let sessions_dir = data_dir.join("sessions");
        let attachments_dir = data_dir.join("attachments");
        let ring_capacity = config.settings.swarm.conversation_ring_capacity;
        Self {
            store: AgentStore::new(&data_dir),
            data_dir,
            sessions_dir,
            attachments_dir,
            primary_manager_id: config.primary_manager_id,
            child_binary: config.settings.runtime.child_binary_path,
            child_args: config.child_args,
            secrets: config.secrets,
            rpc_timeout_ms: config.settings.runtime.rpc_timeout_ms,
            default_model: config.settings.swarm.default_model,
            conversation_ring_capacity: ring_capacity,
            cwd_policy,
            archetypes,
            projector: ConversationProjector::new(ring_capacity.max(64)),
            events: EventBus::new(),
            agents: Mutex::new(HashMap::new()),
        }
    }

    // ── boot ──────────────────────────────────────────────────────────

    pub async fn boot(self: &Arc<Self>) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.sessions_dir)?;
        std::fs::create_dir_all(&self.attachments_dir)?;

        let mut descriptors = self.store.load()?;
        let wake_up_set = compute_wake_up_set(&descriptors);

        for d in &mut descriptors {
            if !d.status.is_terminal() {
                d.status = AgentStatus::Idle;
            }
            d.session_file = AgentDescriptor::derive_session_file(&self.data_dir.to_string_lossy(), &d.agent_id);
            if d.cwd.trim().is_empty() {
                d.cwd = self.data_dir.to_string_lossy().into_owned();
            }
            if d.manager_id.as_str().is_empty() {
                d.manager_id = self.primary_manager_id.clone();
            }
        }
        self.ensure_primary_manager(&mut descriptors);
        reparent_orphaned_workers(&mut descriptors, &self.primary_manager_id);

        {
            let mut agents = self.agents.lock();
            for descriptor in &descriptors {
                let session = Arc::new(Mutex::new(SessionStore::open(
                    &self.sessions_dir,
                    descriptor.agent_id.as_str(),
                )?));
                let history = session.lock().read_all()?;
                let ring = ConversationRing::from_entries(
                    self.conversation_ring_capacity,
                    entries_from_records(&history),
                );
                agents.insert(
                    descriptor.agent_id.clone(),
                    AgentEntry {
                        descriptor: descriptor.clone(),
                        runtime: None,
                        session,
                        conversation_ring: Arc::new(Mutex::new(ring)),
                    },
                );
            }
        }

        let mut restore_order = descriptors.clone();
        restore_order.sort_by(|a, b| sort_key(&self.primary_manager_id, a).cmp(&sort_key(&self.primary_manager_id, b)));

        for descriptor in restore_order {
            if descriptor.status.is_terminal() {
                continue;
            }
            let developer_instructions = self.resolve_system_prompt(None, descriptor.archetype_id.as_deref());
            let Some(conversation_ring) =
                self.agents.lock().get(&descriptor.agent_id).map(|e| Arc::clone(&e.conversation_ring))
            else {
                continue;
            };
            match self.spawn_runtime(&descriptor, developer_instructions, conversation_ring).await {
                Ok((runtime, session)) => {
                    let mut agents = self.agents.lock();
                    if let Some(entry) = agents.get_mut(&descriptor.agent_id) {
                        entry.runtime = Some(runtime);
                        entry.session = session;
                    }
                }
                Err(err) => {
                    if descriptor.agent_id == self.primary_manager_id {
                        return Err(SwarmError::Runtime(err));
                    }
                    warn!(agent_id = %descriptor.agent_id, %err, "agent restore failed, marking stopped_on_restart");
                    let mut agents = self.agents.lock();
                    if let Some(entry) = agents.get_mut(&descriptor.agent_id) {
                        entry.descriptor.status = AgentStatus::StoppedOnRestart;
                    }
                }
            }
        }

        self.persist_store()?;
        self.emit_snapshot();

        for manager_id in wake_up_set {
            let running = self
                .agents
                .lock()
                .get(&manager_id)
                .map(|e| e.runtime.is_some())
                .unwrap_or(false);
            if !running {
                continue;
            }
            let _ = self
                .handle_user_message(
                    "The swarm daemon has restarted. Workers you previously owned may need a status check.",
                    HandleUserMessageOptions {
                        target_agent_id: Some(manager_id),
                        source_context: Some(SourceContext {
                            channel: Channel::Web,
                            channel_id: None,
                            user_id: None,
                            message_id: None,
                            thread_id: None,
                        }),
                        attachments: Vec::new(),
                    },
                )
                .await;
        }

        Ok(())
    }

    fn ensure_primary_manager(&self, descriptors: &mut Vec<AgentDescriptor>) {
        if let Some(existing) = descriptors.iter_mut().find(|d| d.agent_id == self.primary_manager_id) {
            existing.role = AgentRole::Manager;
            existing.manager_id = existing.agent_id.clone();
            return;
        }
        let now = chrono::Utc::now();
        descriptors.push(AgentDescriptor {
            agent_id: self.primary_manager_id.clone(),
            display_name: self.primary_manager_id.to_string(),
            role: AgentRole::Manager,
            manager_id: self.primary_manager_id.clone(),
            archetype_id: Some(hive_core::constants::PRIMARY_MANAGER_ARCHETYPE.to_owned()),
            status: AgentStatus::Idle,
            created_at: now,
            updated_at: now,
            cwd: self.data_dir.to_string_lossy().into_owned(),
            model: self.default_model.clone(),
            session_file: AgentDescriptor::derive_session_file(
                &self.data_dir.to_string_lossy(),
                &self.primary_manager_id,
            ),
            context_usage: None,
        });
    }

    // ── spawnAgent ────────────────────────────────────────────────────

    pub async fn spawn_agent(self: &Arc<Self>, caller: &AgentId, input: SpawnAgentInput) -> Result<AgentId> {
        let caller_model = {
            let agents = self.agents.lock();
            let entry = agents.get(caller).ok_or_else(|| SwarmError::UnknownAgent(caller.clone()))?;
            if !entry.descriptor.is_manager() || entry.runtime.is_none() {
                return Err(SwarmError::CallerNotManager(caller.clone()));
            }
            entry.descriptor.model.clone()
        };

        let worker_id = {
            let agents = self.agents.lock();
            input
                .agent_id
                .uniquify(|candidate| agents.contains_key(&AgentId::from_trusted(candidate)))
        };

        let canonical_cwd = self.cwd_policy.validate(&input.cwd)?;
        let now = chrono::Utc::now();
        let descriptor = AgentDescriptor {
            agent_id: worker_id.clone(),
            display_name: input.display_name,
            role: AgentRole::Worker,
            manager_id: caller.clone(),
            archetype_id: input.archetype_id.clone(),
            status: AgentStatus::Idle,
            created_at: now,
            updated_at: now,
            cwd: canonical_cwd,
            model: input.model.unwrap_or(caller_model),
            session_file: AgentDescriptor::derive_session_file(&self.data_dir.to_string_lossy(), &worker_id),
            context_usage: None,
        };

        let developer_instructions =
            self.resolve_system_prompt(input.system_prompt_override.as_deref(), input.archetype_id.as_deref());
        let conversation_ring = Arc::new(Mutex::new(ConversationRing::new(self.conversation_ring_capacity)));
        let (runtime, session) =
            self.spawn_runtime(&descriptor, developer_instructions, Arc::clone(&conversation_ring)).await?;

        {
            let mut agents = self.agents.lock();
            agents.insert(
                worker_id.clone(),
                AgentEntry { descriptor, runtime: Some(runtime), session, conversation_ring },
            );
        }
        self.persist_store()?;
        self.emit_snapshot();

        if let Some(message) = input.initial_message {
            self.send_message(caller, &worker_id, &message, DeliveryMode::Prompt, SendOptions {
                attachments: Vec::new(),
            })
            .await?;
        }

        Ok(worker_id)
    }

    // ── killAgent ─────────────────────────────────────────────────────

    pub async fn kill_agent(&self, caller: &AgentId, target: &AgentId) -> Result<()> {
        let runtime = {
            let agents = self.agents.lock();
            let caller_entry = agents.get(caller).ok_or_else(|| SwarmError::UnknownAgent(caller.clone()))?;
            if !caller_entry.descriptor.is_manager() {
                return Err(SwarmError::CallerNotManager(caller.clone()));
            }
            let target_entry = agents.get(target).ok_or_else(|| SwarmError::UnknownAgent(target.clone()))?;
            if target_entry.descriptor.is_manager() {
                return Err(SwarmError::CannotKillManager(target.clone()));
            }
            if &target_entry.descriptor.manager_id != caller {
                return Err(SwarmError::NotOwner { caller: caller.clone(), target: target.clone() });
            }
            target_entry.runtime.clone()
        };

        if let Some(runtime) = runtime {
            runtime.terminate(true).await;
        }
        self.mark_status(target, AgentStatus::Terminated);
        self.emit_snapshot();
        Ok(())
    }

    // ── createManager ─────────────────────────────────────────────────

    pub async fn create_manager(self: &Arc<Self>, caller: &AgentId, input: CreateManagerInput) -> Result<AgentId> {
        {
            let agents = self.agents.lock();
            let any_manager_running = agents.values().any(|e| e.descriptor.is_manager() && e.runtime.is_some());
            let is_bootstrap = *caller == self.primary_manager_id && !any_manager_running;
            if !is_bootstrap {
                match agents.get(caller) {
                    Some(entry) if entry.descriptor.is_manager() && entry.runtime.is_some() => {}
                    Some(_) => return Err(SwarmError::CallerNotManager(caller.clone())),
                    None => return Err(SwarmError::UnknownAgent(caller.clone())),
                }
            }
            if agents.contains_key(&input.agent_id) {
                return Err(SwarmError::ManagerAlreadyBootstrapped);
            }
        }

        let canonical_cwd = self.cwd_policy.validate(&input.cwd)?;
        let now = chrono::Utc::now();
        let descriptor = AgentDescriptor {
            agent_id: input.agent_id.clone(),
            display_name: input.display_name,
            role: AgentRole::Manager,
            manager_id: input.agent_id.clone(),
            archetype_id: Some(hive_core::constants::PRIMARY_MANAGER_ARCHETYPE.to_owned()),
            status: AgentStatus::Idle,
            created_at: now,
            updated_at: now,
            cwd: canonical_cwd,
            model: input.model.unwrap_or_else(|| self.default_model.clone()),
            session_file: AgentDescriptor::derive_session_file(&self.data_dir.to_string_lossy(), &input.agent_id),
            context_usage: None,
        };

        let developer_instructions = self.resolve_system_prompt(None, descriptor.archetype_id.as_deref());
        let conversation_ring = Arc::new(Mutex::new(ConversationRing::new(self.conversation_ring_capacity)));
        let (runtime, session) =
            self.spawn_runtime(&descriptor, developer_instructions, Arc::clone(&conversation_ring)).await?;

        let agent_id = descriptor.agent_id.clone();
        {
            let mut agents = self.agents.lock();
            agents.insert(
                agent_id.clone(),
                AgentEntry { descriptor, runtime: Some(runtime), session, conversation_ring },
            );
        }
        self.persist_store()?;
        self.emit_snapshot();
        Ok(agent_id)
    }

    // ── deleteManager ─────────────────────────────────────────────────

    pub async fn delete_manager(&self, caller: &AgentId, target_manager: &AgentId) -> Result<()> {
        {
            let agents = self.agents.lock();
            let caller_entry = agents.get(caller).ok_or_else(|| SwarmError::UnknownAgent(caller.clone()))?;
            if !caller_entry.descriptor.is_manager() {
                return Err(SwarmError::CallerNotManager(caller.clone()));
            }
            agents.get(target_manager).ok_or_else(|| SwarmError::UnknownAgent(target_manager.clone()))?;
        }

        if *target_manager == self.primary_manager_id {
            let other_manager_exists = {
                let agents = self.agents.lock();
                agents
                    .values()
                    .any(|e| e.descriptor.is_manager() && e.descriptor.agent_id != *target_manager && !e.descriptor.status.is_terminal())
            };
            if !other_manager_exists {
                return Err(SwarmError::CannotDeleteSolePrimary);
            }
        }

        let worker_ids: Vec<AgentId> = {
            let agents = self.agents.lock();
            agents
                .values()
                .filter(|e| &e.descriptor.manager_id == target_manager && e.descriptor.agent_id != *target_manager)
                .map(|e| e.descriptor.agent_id.clone())
                .collect()
        };
        for worker in &worker_ids {
            let runtime = self.agents.lock().get(worker).and_then(|e| e.runtime.clone());
            if let Some(runtime) = runtime {
                runtime.terminate(true).await;
            }
            self.agents.lock().remove(worker);
        }

        let manager_runtime = self.agents.lock().get(target_manager).and_then(|e| e.runtime.clone());
        if let Some(runtime) = manager_runtime {
            runtime.terminate(true).await;
        }
        self.agents.lock().remove(target_manager);

        self.persist_store()?;
        self.emit_snapshot();
        Ok(())
    }

    // ── stageAttachments ─────────────────────────────────────────────

    /// Resolves raw caller-supplied attachments into the form `sendMessage`
    /// and `handleUserMessage` expect, writing binary payloads to
    /// `attachments_dir/{agentSegment}/{batchId}/{NN}-{safeFileName}` and
    /// returning an `Attachment::Binary` pointing at the absolute path.
    /// All attachments in one call share a `BatchId`.
    pub fn stage_attachments(&self, agent_id: &AgentId, raw: Vec<RawAttachment>) -> Result<Vec<Attachment>> {
        let batch_id = BatchId::new();
        let batch_dir = self.attachments_dir.join(agent_id.as_str()).join(batch_id.as_str());
        let mut seq = 0u32;
        raw.into_iter()
            .map(|attachment| match attachment {
                RawAttachment::Text { file_name, content } => Ok(Attachment::Text { file_name, content }),
                RawAttachment::Image { mime, base64 } => Ok(Attachment::Image { mime, base64 }),
                RawAttachment::Binary { file_name, mime, bytes } => {
                    seq += 1;
                    std::fs::create_dir_all(&batch_dir)?;
                    let staged_name = format!("{seq:02}-{}", sanitize_file_name(&file_name));
                    let path = batch_dir.join(&staged_name);
                    std::fs::write(&path, &bytes)?;
                    let absolute_path = path
                        .canonicalize()
                        .unwrap_or(path)
                        .to_string_lossy()
                        .into_owned();
                    Ok(Attachment::Binary { file_name, absolute_path, mime })
                }
            })
            .collect()
    }

    // ── sendMessage ───────────────────────────────────────────────────

    pub async fn send_message(
        &self,
        from: &AgentId,
        target: &AgentId,
        text: &str,
        delivery: DeliveryMode,
        options: SendOptions,
    ) -> Result<SendReceipt> {
        self.send_message_with_origin(from, target, text, delivery, MessageOrigin::Internal, options)
            .await
    }

    async fn send_message_with_origin(
        &self,
        from: &AgentId,
        target: &AgentId,
        text: &str,
        delivery: DeliveryMode,
        origin: MessageOrigin,
        options: SendOptions,
    ) -> Result<SendReceipt> {
        let runtime = {
            let agents = self.agents.lock();
            let from_entry = agents.get(from).ok_or_else(|| SwarmError::UnknownAgent(from.clone()))?;
            if !from_entry.descriptor.is_manager() {
                return Err(SwarmError::CallerNotManager(from.clone()));
            }
            if from_entry.descriptor.status.is_terminal() {
                return Err(SwarmError::TargetTerminated(from.clone()));
            }
            let target_entry = agents.get(target).ok_or_else(|| SwarmError::UnknownAgent(target.clone()))?;
            if target_entry.descriptor.status.is_terminal() {
                return Err(SwarmError::TargetTerminated(target.clone()));
            }
            if &target_entry.descriptor.manager_id != from {
                return Err(SwarmError::NotOwner { caller: from.clone(), target: target.clone() });
            }
            target_entry.runtime.clone().ok_or_else(|| SwarmError::TargetTerminated(target.clone()))?
        };

        let body = transform_outbound_text(text, origin, &options.attachments);
        let receipt = runtime.send_message(&body, &options.attachments, delivery).await?;
        Ok(receipt)
    }

    // ── handleUserMessage ─────────────────────────────────────────────

    pub async fn handle_user_message(
        &self,
        text: &str,
        options: HandleUserMessageOptions,
    ) -> Result<HandleUserMessageOutcome> {
        let target_id = options.target_agent_id.clone().unwrap_or_else(|| self.primary_manager_id.clone());

        let (is_manager, manager_owner, runtime) = {
            let agents = self.agents.lock();
            let entry = agents.get(&target_id).ok_or_else(|| SwarmError::UnknownAgent(target_id.clone()))?;
            if entry.descriptor.status.is_terminal() {
                return Err(SwarmError::TargetTerminated(target_id.clone()));
            }
            (entry.descriptor.is_manager(), entry.descriptor.manager_id.clone(), entry.runtime.clone())
        };

        let trimmed = text.trim();
        if is_manager && options.attachments.is_empty() {
            if let Some(rest) = strip_compact_command(trimmed) {
                let instructions = (!rest.is_empty()).then_some(rest);
                self.compact_agent_context(&target_id, instructions).await?;
                return Ok(HandleUserMessageOutcome::Compacted);
            }
        }

        let channel = options
            .source_context
            .as_ref()
            .map(|c| c.channel.clone())
            .unwrap_or(Channel::Web);
        let entry = projector::user_input_entry(&target_id, text, options.attachments.clone(), channel);
        let session_and_ring = self
            .agents
            .lock()
            .get(&target_id)
            .map(|e| (Arc::clone(&e.session), Arc::clone(&e.conversation_ring)));
        if let Some((session, ring)) = session_and_ring {
            self.publish_entry(&session, &ring, entry);
        }

        if is_manager {
            let runtime = runtime.ok_or_else(|| SwarmError::TargetTerminated(target_id.clone()))?;
            let metadata = options
                .source_context
                .as_ref()
                .map(|c| format!("[source: {}]\n", channel_name(&c.channel)))
                .unwrap_or_default();
            let body = format!("{metadata}{trimmed}");
            let receipt = runtime.send_message(&body, &options.attachments, DeliveryMode::Steer).await?;
            Ok(HandleUserMessageOutcome::Delivered(receipt))
        } else {
            let receipt = self
                .send_message_with_origin(
                    &manager_owner,
                    &target_id,
                    text,
                    DeliveryMode::Auto,
                    MessageOrigin::User,
                    SendOptions { attachments: options.attachments },
                )
                .await?;
            Ok(HandleUserMessageOutcome::Delivered(receipt))
        }
    }

    // ── resetManagerSession ───────────────────────────────────────────

    pub async fn reset_manager_session(self: &Arc<Self>, manager_id: &AgentId, reason: ResetReason) -> Result<()> {
        let (old_runtime, descriptor) = {
            let agents = self.agents.lock();
            let entry = agents.get(manager_id).ok_or_else(|| SwarmError::UnknownAgent(manager_id.clone()))?;
            if !entry.descriptor.is_manager() {
                return Err(SwarmError::CallerNotManager(manager_id.clone()));
            }
            (entry.runtime.clone(), entry.descriptor.clone())
        };

        if let Some(runtime) = old_runtime {
            runtime.terminate(true).await;
        }

        let session_path = self.sessions_dir.join(format!("{}.jsonl", manager_id.as_str()));
        if session_path.exists() {
            std::fs::remove_file(&session_path)?;
        }

        let developer_instructions = self.resolve_system_prompt(None, descriptor.archetype_id.as_deref());
        let conversation_ring = Arc::new(Mutex::new(ConversationRing::new(self.conversation_ring_capacity)));
        let (new_runtime, session) =
            self.spawn_runtime(&descriptor, developer_instructions, Arc::clone(&conversation_ring)).await?;

        {
            let mut agents = self.agents.lock();
            if let Some(entry) = agents.get_mut(manager_id) {
                entry.runtime = Some(new_runtime);
                entry.session = session;
                entry.conversation_ring = conversation_ring;
            }
        }

        self.events.emit(SwarmEvent::ConversationReset { agent_id: manager_id.clone(), reason });
        self.emit_snapshot();
        Ok(())
    }

    // ── compactAgentContext ───────────────────────────────────────────

    pub async fn compact_agent_context(&self, agent_id: &AgentId, custom_instructions: Option<&str>) -> Result<()> {
        let (runtime, session, ring) = {
            let agents = self.agents.lock();
            let entry = agents.get(agent_id).ok_or_else(|| SwarmError::UnknownAgent(agent_id.clone()))?;
            if !entry.descriptor.is_manager() {
                return Err(SwarmError::CallerNotManager(agent_id.clone()));
            }
            let runtime = entry.runtime.clone().ok_or_else(|| SwarmError::TargetTerminated(agent_id.clone()))?;
            (runtime, Arc::clone(&entry.session), Arc::clone(&entry.conversation_ring))
        };

        self.publish_entry(&session, &ring, system_message(agent_id, "Compacting context..."));
        match runtime.compact(custom_instructions).await {
            Ok(()) => {
                self.publish_entry(&session, &ring, system_message(agent_id, "Compaction complete."));
                Ok(())
            }
            Err(err) => {
                self.publish_entry(&session, &ring, system_message(agent_id, &format!("Compaction failed: {err}")));
                Err(SwarmError::Runtime(err))
            }
        }
    }

    // ── queries ───────────────────────────────────────────────────────

    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentDescriptor> {
        let mut descriptors: Vec<AgentDescriptor> = self.agents.lock().values().map(|e| e.descriptor.clone()).collect();
        descriptors.sort_by(|a, b| sort_key(&self.primary_manager_id, a).cmp(&sort_key(&self.primary_manager_id, b)));
        descriptors
    }

    pub fn conversation_history(&self, agent_id: &AgentId) -> Result<Vec<ConversationEntry>> {
        let ring = self
            .agents
            .lock()
            .get(agent_id)
            .map(|e| Arc::clone(&e.conversation_ring))
            .ok_or_else(|| SwarmError::UnknownAgent(agent_id.clone()))?;
        Ok(ring.lock().snapshot())
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    // ── internal plumbing ─────────────────────────────────────────────

    /// The base environment every spawned child inherits: loaded secrets,
    /// plus `SWARM_DATA_DIR`/`SWARM_MEMORY_FILE`.
    fn child_envs(&self, agent_id: &AgentId) -> HashMap<String, String> {
        let mut envs = self.secrets.clone();
        envs.insert("SWARM_DATA_DIR".to_owned(), self.data_dir.to_string_lossy().into_owned());
        envs.insert(
            "SWARM_MEMORY_FILE".to_owned(),
            self.data_dir.join("memory").join(format!("{}.json", agent_id.as_str())).to_string_lossy().into_owned(),
        );
        envs
    }

    async fn spawn_runtime(
        self: &Arc<Self>,
        descriptor: &AgentDescriptor,
        developer_instructions: String,
        conversation_ring: Arc<Mutex<ConversationRing>>,
    ) -> std::result::Result<(Arc<AgentRuntime>, Arc<Mutex<SessionStore>>), RuntimeError> {
        let thread_session = SessionStore::open(&self.sessions_dir, descriptor.agent_id.as_str())
            .map_err(|e| RuntimeError::Internal(e.to_string()))?;
        let publish_session = Arc::new(Mutex::new(
            SessionStore::open(&self.sessions_dir, descriptor.agent_id.as_str())
                .map_err(|e| RuntimeError::Internal(e.to_string()))?,
        ));

        let agent_id = descriptor.agent_id.clone();
        let is_manager = descriptor.is_manager();
        let callbacks = self.build_runtime_callbacks(
            agent_id.clone(),
            is_manager,
            Arc::clone(&publish_session),
            conversation_ring,
        );

        let config = RuntimeConfig {
            agent_id,
            child_binary: self.child_binary.clone(),
            child_args: self.child_args.clone(),
            cwd: PathBuf::from(&descriptor.cwd),
            envs: self.child_envs(&descriptor.agent_id),
            developer_instructions,
            rpc_timeout_ms: self.rpc_timeout_ms,
        };

        let runtime = AgentRuntime::boot(config, thread_session, callbacks).await?;
        Ok((runtime, publish_session))
    }

    fn build_runtime_callbacks(
        self: &Arc<Self>,
        agent_id: AgentId,
        is_manager: bool,
        publish_session: Arc<Mutex<SessionStore>>,
        conversation_ring: Arc<Mutex<ConversationRing>>,
    ) -> RuntimeCallbacks {
        let manager_for_event = Arc::clone(self);
        let agent_id_for_event = agent_id.clone();
        let manager_for_status = Arc::clone(self);
        let agent_id_for_status = agent_id.clone();
        let manager_for_error = Arc::clone(self);
        let agent_id_for_error = agent_id;

        RuntimeCallbacks {
            on_session_event: Some(Arc::new(move |event: RuntimeSessionEvent| {
                manager_for_event.project_and_publish(
                    &publish_session,
                    &conversation_ring,
                    &agent_id_for_event,
                    is_manager,
                    &event,
                );
            })),
            on_agent_end: None,
            on_runtime_error: Some(Arc::new(move |err: RuntimeErrorEvent| {
                warn!(agent_id = %agent_id_for_error, phase = err.phase, message = %err.message, "runtime error");
                if !err.recoverable {
                    manager_for_error.mark_status(&agent_id_for_error, AgentStatus::Terminated);
                }
            })),
            on_status_change: Some(Arc::new(move |status: RuntimeStatus| {
                manager_for_status.mark_status(&agent_id_for_status, map_runtime_status(status));
            })),
        }
    }

    fn project_and_publish(
        &self,
        session: &Mutex<SessionStore>,
        ring: &Mutex<ConversationRing>,
        agent_id: &AgentId,
        is_manager: bool,
        event: &RuntimeSessionEvent,
    ) {
        for entry in self.projector.project(agent_id, is_manager, event) {
            self.publish_entry(session, ring, entry);
        }
    }

    fn publish_entry(&self, session: &Mutex<SessionStore>, ring: &Mutex<ConversationRing>, entry: ConversationEntry) {
        ring.lock().push(entry.clone());
        if let Ok(value) = serde_json::to_value(&entry) {
            let record = SessionRecord::custom(CONVERSATION_ENTRY_CUSTOM_TYPE, value);
            if let Err(err) = session.lock().append(&record) {
                warn!(%err, "failed to persist conversation entry");
            }
        }
        match &entry {
            ConversationEntry::ConversationMessage { .. } => self.events.emit(SwarmEvent::ConversationMessage(entry)),
            ConversationEntry::ConversationLog { .. } => self.events.emit(SwarmEvent::ConversationLog(entry)),
        }
    }

    fn mark_status(&self, agent_id: &AgentId, status: AgentStatus) {
        let updated = {
            let mut agents = self.agents.lock();
            if let Some(entry) = agents.get_mut(agent_id) {
                entry.descriptor.status = status;
                entry.descriptor.updated_at = chrono::Utc::now();
                true
            } else {
                false
            }
        };
        if updated {
            self.events.emit(SwarmEvent::AgentStatus { agent_id: agent_id.clone(), status });
            if let Err(err) = self.persist_store() {
                warn!(%err, "failed to persist agent store after status change");
            }
        }
    }

    fn persist_store(&self) -> Result<()> {
        let mut descriptors: Vec<AgentDescriptor> =
            self.agents.lock().values().map(|e| e.descriptor.clone()).collect();
        descriptors.sort_by(|a, b| sort_key(&self.primary_manager_id, a).cmp(&sort_key(&self.primary_manager_id, b)));
        self.store.save(&descriptors)?;
        Ok(())
    }

    fn emit_snapshot(&self) {
        let agents = self.list_agents();
        self.events.emit(SwarmEvent::AgentsSnapshot { agents });
    }

    fn resolve_system_prompt(&self, explicit: Option<&str>, archetype_id: Option<&str>) -> String {
        if let Some(prompt) = explicit {
            if !prompt.trim().is_empty() {
                return prompt.to_owned();
            }
        }
        if let Some(id) = archetype_id {
            if let Ok(prompt) = self.archetypes.prompt_for(id) {
                return prompt;
            }
        }
        DEFAULT_WORKER_PROMPT.to_owned()
    }
}

/// Reparents any worker whose `managerId` no longer resolves to an existing,
/// non-terminated manager descriptor onto the primary manager. Orphaned
/// workers are reparented rather than left dangling on every boot.
fn reparent_orphaned_workers(descriptors: &mut [AgentDescriptor], primary_manager_id: &AgentId) {
    let live_managers: HashSet<AgentId> = descriptors
        .iter()
        .filter(|d| d.is_manager() && !d.status.is_terminal())
        .map(|d| d.agent_id.clone())
        .collect();
    for d in descriptors.iter_mut() {
        if matches!(d.role, AgentRole::Worker) && !live_managers.contains(&d.manager_id) {
            d.manager_id = primary_manager_id.clone();
        }
    }
}

/// Recovers the `conversation_entry` custom records persisted in a session
/// file, in on-disk order, for rehydrating a `ConversationRing` on boot.
fn entries_from_records(records: &[SessionRecord]) -> Vec<ConversationEntry> {
    records
        .iter()
        .filter_map(|r| r.as_custom(CONVERSATION_ENTRY_CUSTOM_TYPE))
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

fn compute_wake_up_set(descriptors: &[AgentDescriptor]) -> HashSet<AgentId> {
    descriptors
        .iter()
        .filter(|d| matches!(d.role, AgentRole::Worker) && !d.status.is_terminal())
        .map(|d| d.manager_id.clone())
        .collect()
}

fn map_runtime_status(status: RuntimeStatus) -> AgentStatus {
    match status {
        RuntimeStatus::Idle | RuntimeStatus::Starting => AgentStatus::Idle,
        RuntimeStatus::Streaming => AgentStatus::Streaming,
        RuntimeStatus::Terminated => AgentStatus::Terminated,
    }
}

/// Strips everything but the base name and keeps only
/// `[A-Za-z0-9._-]`, collapsing anything else to `_`, so a staged
/// attachment path can never escape its batch directory.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "file".to_owned()
    } else {
        cleaned
    }
}

fn channel_name(channel: &Channel) -> &'static str {
    match channel {
        Channel::Web => "web",
        Channel::Slack => "slack",
        Channel::Telegram => "telegram",
    }
}

fn system_message(agent_id: &AgentId, text: &str) -> ConversationEntry {
    ConversationEntry::ConversationMessage {
        agent_id: agent_id.clone(),
        timestamp: chrono::Utc::now(),
        source: hive_core::model::MessageSource::System,
        text: text.to_owned(),
        attachments: Vec::new(),
        source_context: None,
    }
}

/// `origin="user"` passes through verbatim; `origin="internal"` gets a
/// `SYSTEM: ` prefix unless it's empty or already so marked. Text and
/// binary attachments are inlined as references; image attachments are
/// left for the runtime to embed as image parts.
fn transform_outbound_text(text: &str, origin: MessageOrigin, attachments: &[Attachment]) -> String {
    let mut body = match origin {
        MessageOrigin::User => text.to_owned(),
        MessageOrigin::Internal => {
            let trimmed = text.trim_start();
            if trimmed.is_empty() || trimmed.to_lowercase().starts_with("system:") {
                text.to_owned()
            } else {
                format!("SYSTEM: {text}")
            }
        }
    };
    for attachment in attachments {
        match attachment {
            Attachment::Text { file_name, content } => {
                body.push_str(&format!("\n\n[Attached: {file_name}]\n{content}"));
            }
            Attachment::Binary { file_name, absolute_path, mime } => {
                body.push_str(&format!("\n\n[Attached file: {file_name} ({mime}) at {absolute_path}]"));
            }
            Attachment::Image { .. } => {}
        }
    }
    body
}

/// Parses a leading `/compact` slash command, returning the trailing
/// instructions text (possibly empty). `None` if `trimmed` isn't exactly
/// `/compact` or `/compact <rest>`.
fn strip_compact_command(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix("/compact")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}
