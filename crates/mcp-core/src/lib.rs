//! Shared types for the agency MCP server: JSON-RPC envelopes, the unified
//! error taxonomy, protocol-version negotiation, request context, session id
//! shape, and server configuration.

pub mod config;
pub mod context;
pub mod error;
pub mod jsonrpc;
pub mod session_id;
pub mod version;

pub use context::RequestContext;
pub use error::{Error, ErrorCode, Result};
pub use jsonrpc::{JsonRpcError, JsonRpcPayload, JsonRpcResponse, JsonRpcServerRequest, RequestId};
pub use version::VersionNegotiator;
