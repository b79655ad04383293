//! # hive-logging
//!
//! Structured process logging with `tracing` and `tracing-subscriber`.
//!
//! The daemon's durable record of what an agent did lives in its session
//! JSONL file (`hive-session`), not in a log database — this crate only
//! wires up the global subscriber and a span helper for agent context.

#![deny(unsafe_code)]

pub mod errors;
pub mod subscriber;
pub mod types;

pub use errors::{LoggingError, Result};
pub use subscriber::{agent_span, init};
pub use types::LogLevel;
