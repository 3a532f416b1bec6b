//! JSON-RPC 2.0 envelope types shared by the engine, transport, and storage layers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC protocol version string, always `"2.0"`.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request identifier.
///
/// Per spec, an `id` (when present) MUST be a string or a number, and MUST NOT
/// be null -- null is reserved for parse-error responses and is represented
/// by the absence of an id, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id, as sent by most JSON-RPC clients.
    Number(i64),
    /// String id.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// An inbound JSON-RPC envelope, still untyped with respect to `method`/`params`.
///
/// We deserialize into this first so envelope validation (jsonrpc version,
/// id shape) can run before method dispatch even looks at `params`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    /// Must equal `"2.0"`.
    #[serde(default)]
    pub jsonrpc: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters, method-specific.
    #[serde(default)]
    pub params: Option<Value>,
    /// Request id. Absence marks a notification.
    #[serde(default)]
    pub id: Option<Value>,
}

/// A JSON-RPC response payload: exactly one of `result`/`error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcPayload {
    /// Successful result.
    Success {
        /// The method's return value.
        result: Value,
    },
    /// Failed call.
    Error {
        /// The JSON-RPC error object.
        error: JsonRpcError,
    },
}

/// A full JSON-RPC response message, as queued for delivery or returned
/// synchronously from `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Result or error.
    #[serde(flatten)]
    pub payload: JsonRpcPayload,
    /// Echoes the request id, or `null` for parse errors.
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    /// Build a successful response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            payload: JsonRpcPayload::Success { result },
            id: Some(id),
        }
    }

    /// Build an error response tied to a request id.
    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            payload: JsonRpcPayload::Error { error },
            id,
        }
    }

    /// True if this response carries a result rather than an error.
    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcPayload::Success { .. })
    }
}

/// A JSON-RPC server-originated request (`sampling/createMessage`, `roots/list`,
/// `elicitation/create`), queued through the same pipeline as responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcServerRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name, e.g. `sampling/createMessage`.
    pub method: String,
    /// Method parameters.
    pub params: Value,
    /// Id the client must echo back in its `*/response` reply.
    pub id: RequestId,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code, see [`crate::error::ErrorCode`].
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured error data (e.g. OAuth discovery URLs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_id_accepts_number_and_string() {
        let n: RequestId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(n, RequestId::Number(42));
        let s: RequestId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(s, RequestId::String("abc".to_string()));
    }

    #[test]
    fn success_response_serializes_result_only() {
        let resp = JsonRpcResponse::success(RequestId::Number(1), json!({"ok": true}));
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v.get("result").is_some());
        assert!(v.get("error").is_none());
        assert_eq!(v["jsonrpc"], "2.0");
    }

    #[test]
    fn error_response_for_parse_error_has_null_id() {
        let err = JsonRpcError {
            code: -32700,
            message: "Parse error".to_string(),
            data: None,
        };
        let resp = JsonRpcResponse::error(None, err);
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v["id"].is_null());
    }
}
