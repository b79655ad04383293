//! # hive-runtime
//!
//! `AgentRuntime`: the per-agent turn/steer state machine.
//!
//! - **Boot**: `initialize` -> `initialized` -> ensure authentication ->
//!   resume or start a thread.
//! - **States**: `Idle -> Starting -> Streaming -> Idle`, plus the
//!   absorbing `Terminated`.
//! - **Delivery**: `send_message` starts a turn or enqueues a steer
//!   depending on the requested mode and current status.
//! - **Translation**: inbound child notifications become the normalized
//!   [`hive_core::model::RuntimeSessionEvent`] vocabulary.

#![deny(unsafe_code)]

pub mod callbacks;
pub mod delivery;
pub mod errors;
pub mod runtime;
pub mod state;

pub use callbacks::{RuntimeCallbacks, RuntimeErrorEvent};
pub use delivery::{message_key, DeliveryMode, ResolvedMode, SendReceipt};
pub use errors::{BootPhase, RuntimeError};
pub use runtime::{AgentRuntime, RuntimeConfig};
pub use state::{RuntimeState, RuntimeStatus};
