//! # hive-session
//!
//! Append-only per-agent JSONL session log (`sessions/{agentId}.jsonl`).
//! Owned by whichever component appends to it; readers never mutate.

#![deny(unsafe_code)]

pub mod errors;
pub mod record;
pub mod store;

pub use errors::{Result, SessionError};
pub use record::SessionRecord;
pub use store::SessionStore;
