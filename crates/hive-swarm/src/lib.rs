//! # hive-swarm
//!
//! `SwarmManager`: the single source of truth for the agent tree
//! (manager/worker `AgentRuntime`s), the sole writer of `agents.json`, and
//! the conversation projector that turns runtime events into the
//! persisted, published transcript.
//!
//! - **Tree**: one primary manager plus zero or more additional managers,
//!   each owning zero or more workers (`spawnAgent`/`killAgent`,
//!   `createManager`/`deleteManager`).
//! - **Routing**: `sendMessage` (manager-to-worker) and
//!   `handleUserMessage` (external-channel entry point), both subject to
//!   ownership and termination checks.
//! - **Conversation**: every runtime event is projected into
//!   `ConversationEntry` values, persisted to the target agent's session
//!   file, and published on the swarm-wide [`events::EventBus`].

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod manager;
pub mod projector;
pub mod store;

pub use errors::{Result, SwarmError};
pub use events::{EventBus, ResetReason, SwarmEvent};
pub use manager::{
    CreateManagerInput, HandleUserMessageOptions, HandleUserMessageOutcome, MessageOrigin,
    RawAttachment, SendOptions, SpawnAgentInput, SwarmManager, SwarmManagerConfig,
};
pub use projector::ConversationProjector;
pub use store::AgentStore;
