//! Unified error type and JSON-RPC error-code taxonomy.

use crate::jsonrpc::JsonRpcError;
use serde_json::Value;

/// Standard JSON-RPC / MCP error codes this server can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed JSON on the wire.
    ParseError,
    /// Missing `jsonrpc`, null id, or duplicate id.
    InvalidRequest,
    /// Unknown or version-ungated method.
    MethodNotFound,
    /// Schema violation or missing required field.
    InvalidParams,
    /// Handler panic, storage failure, or other unexpected fault.
    InternalError,
    /// No or invalid bearer token, or resource-binding violation.
    AuthRequired,
    /// Missing, expired, or version-mismatched session.
    SessionRequired,
    /// Unsupported HTTP verb against an MCP endpoint.
    UnsupportedHttpMethod,
}

impl ErrorCode {
    /// The numeric JSON-RPC code.
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::AuthRequired => -32000,
            Self::SessionRequired => -32001,
            Self::UnsupportedHttpMethod => -32002,
        }
    }

    /// The conventional short message for this code.
    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::AuthRequired => "Authentication required",
            Self::SessionRequired => "Session required",
            Self::UnsupportedHttpMethod => "Unsupported HTTP method",
        }
    }
}

/// Crate-wide error type. Every fallible engine/auth/transport operation
/// returns `Result<T, Error>`; the dispatcher is the only place that turns
/// this into a wire `JsonRpcError`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Maps directly to a JSON-RPC error code with a message.
    #[error("{code_message}: {detail}", code_message = .code.message())]
    Protocol {
        /// The JSON-RPC code this error maps to.
        code: ErrorCode,
        /// Human-readable detail.
        detail: String,
        /// Optional structured data to attach (e.g. OAuth discovery URLs).
        data: Option<Value>,
    },
    /// A storage-layer failure (connection, constraint violation, etc).
    #[error("storage error: {0}")]
    Storage(String),
    /// Request JSON failed to parse.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a protocol error with no extra data.
    pub fn protocol(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            detail: detail.into(),
            data: None,
        }
    }

    /// Build a protocol error carrying structured `data` (used for the
    /// OAuth discovery payload on auth failures).
    pub fn protocol_with_data(code: ErrorCode, detail: impl Into<String>, data: Value) -> Self {
        Self::Protocol {
            code,
            detail: detail.into(),
            data: Some(data),
        }
    }

    /// The JSON-RPC code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol { code, .. } => *code,
            Self::Storage(_) => ErrorCode::InternalError,
            Self::Json(_) => ErrorCode::ParseError,
        }
    }

    /// Convert into the wire `JsonRpcError` object.
    pub fn into_jsonrpc(self) -> JsonRpcError {
        let code = self.code();
        let data = match self {
            Self::Protocol { data, .. } => data,
            _ => None,
        };
        JsonRpcError {
            code: code.code(),
            message: self.to_string(),
            data,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
