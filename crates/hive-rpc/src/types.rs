//! Wire types for the line-delimited JSON-RPC protocol spoken with a child
//! coding-agent process over its stdio.
//!
//! A line is one JSON value. Inbound frames are disambiguated by field
//! presence rather than a tag: a `result` key means a response, an `error`
//! key means a failed response, `id` + `method` means the child is issuing
//! us a request, and `method` alone (no `id`) means a notification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request or notification id. Requests we send carry a monotonically
/// increasing number; requests the child sends us can carry either shape,
/// so we preserve whatever it sent to echo back in the response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A frame we write to the child's stdin: either a request (has `id`) or a
/// notification (no `id`). Both are encoded identically on the wire.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RpcId>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A response frame we write back to the child, answering one of its
/// requests.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundResponse {
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorBody>,
}

/// The `error` object inside a JSON-RPC error frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Method not found, per the JSON-RPC 2.0 reserved range.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// An `onRequest` callback threw; the parent reports it generically.
pub const SERVER_ERROR: i64 = -32000;

/// An inbound line from the child, decoded into its frame kind.
#[derive(Clone, Debug)]
pub enum InboundFrame {
    /// `id` + `result`.
    Response { id: RpcId, result: Value },
    /// `id` + `error`.
    Error { id: RpcId, error: JsonRpcErrorBody },
    /// `id` + `method` (+ optional `params`): the child wants us to do
    /// something and reply.
    Request {
        id: RpcId,
        method: String,
        params: Option<Value>,
    },
    /// `method` (+ optional `params`), no `id`.
    Notification { method: String, params: Option<Value> },
}

/// Raw shape of one decoded JSON line, used only to classify it by field
/// presence before converting to [`InboundFrame`].
#[derive(Deserialize)]
struct RawLine {
    id: Option<RpcId>,
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

/// Classify one decoded JSON line into its frame kind.
///
/// Returns `None` if the line matches none of the four recognized shapes
/// (e.g. has neither `id`/`result`/`error` nor `method`).
#[must_use]
pub fn classify_line(value: Value) -> Option<InboundFrame> {
    let raw: RawLine = serde_json::from_value(value).ok()?;
    match (raw.id, raw.method, raw.result, raw.error) {
        (Some(id), _, Some(result), None) => Some(InboundFrame::Response { id, result }),
        (Some(id), _, _, Some(error)) => Some(InboundFrame::Error { id, error }),
        (Some(id), Some(method), _, _) => Some(InboundFrame::Request {
            id,
            method,
            params: raw.params,
        }),
        (None, Some(method), _, _) => Some(InboundFrame::Notification {
            method,
            params: raw.params,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_response() {
        let value = serde_json::json!({"id": 1, "result": {"ok": true}});
        let frame = classify_line(value).unwrap();
        assert!(matches!(frame, InboundFrame::Response { id: RpcId::Number(1), .. }));
    }

    #[test]
    fn classifies_error() {
        let value = serde_json::json!({"id": "a", "error": {"code": -32000, "message": "boom"}});
        let frame = classify_line(value).unwrap();
        match frame {
            InboundFrame::Error { id, error } => {
                assert_eq!(id, RpcId::String("a".into()));
                assert_eq!(error.code, -32000);
            }
            _ => panic!("expected error frame"),
        }
    }

    #[test]
    fn classifies_request() {
        let value = serde_json::json!({"id": 7, "method": "fs/read", "params": {"path": "/x"}});
        let frame = classify_line(value).unwrap();
        match frame {
            InboundFrame::Request { id, method, params } => {
                assert_eq!(id, RpcId::Number(7));
                assert_eq!(method, "fs/read");
                assert!(params.is_some());
            }
            _ => panic!("expected request frame"),
        }
    }

    #[test]
    fn classifies_notification() {
        let value = serde_json::json!({"method": "turn/started"});
        let frame = classify_line(value).unwrap();
        match frame {
            InboundFrame::Notification { method, params } => {
                assert_eq!(method, "turn/started");
                assert!(params.is_none());
            }
            _ => panic!("expected notification frame"),
        }
    }

    #[test]
    fn rejects_malformed_line() {
        let value = serde_json::json!({"foo": "bar"});
        assert!(classify_line(value).is_none());
    }

    #[test]
    fn rpc_id_display() {
        assert_eq!(RpcId::Number(3).to_string(), "3");
        assert_eq!(RpcId::String("x".into()).to_string(), "x");
    }
}
