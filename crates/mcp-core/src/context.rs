//! Request context snapshot handed to registry handlers: a plain value,
//! never a back-pointer into the engine.

use crate::jsonrpc::RequestId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything a tool/prompt/resource handler needs to know about the call
/// it is serving, captured once by the engine before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Tenant ("agency") this request is scoped to.
    pub tenant_id: Uuid,
    /// Authenticated user id, when known (absent under `auth.authless`).
    pub user_id: Option<String>,
    /// Session id this request arrived on (absent only for `initialize`,
    /// which creates the session as part of its own response).
    pub session_id: Option<String>,
    /// Protocol version this session negotiated.
    pub protocol_version: String,
    /// The JSON-RPC request id being served, when applicable.
    pub request_id: Option<RequestId>,
}

impl RequestContext {
    /// Build a context for a post-initialize request bound to a live session.
    pub fn new(
        tenant_id: Uuid,
        user_id: Option<String>,
        session_id: String,
        protocol_version: String,
        request_id: Option<RequestId>,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            session_id: Some(session_id),
            protocol_version,
            request_id,
        }
    }

    /// Build a context for the `initialize` call itself, before a session
    /// id exists.
    pub fn for_initialize(
        tenant_id: Uuid,
        user_id: Option<String>,
        protocol_version: String,
        request_id: Option<RequestId>,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            session_id: None,
            protocol_version,
            request_id,
        }
    }
}
