//! # hive-rpc
//!
//! Full-duplex, line-delimited JSON-RPC over a child process's stdio. This
//! is the transport [`hive_runtime`'s `AgentRuntime`](../hive_runtime) uses
//! to drive the external coding-agent binary, not a server-facing API.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod types;

pub use client::{JsonRpcClient, RequestOutcome, RpcCallbacks};
pub use errors::{Result, RpcError};
pub use types::{InboundFrame, JsonRpcErrorBody, OutboundFrame, OutboundResponse, RpcId};
