//! The JSON-RPC dispatch engine: envelope validation, session resolution,
//! request-id uniqueness, method dispatch, and response queuing.

use std::sync::Arc;

use mcp_core::jsonrpc::{JsonRpcResponse, RawEnvelope, RequestId};
use mcp_core::{config::ServerConfig, Error, ErrorCode, RequestContext, Result, VersionNegotiator};
use mcp_registry::Registries;
use mcp_storage::Storage;
use serde_json::Value;
use uuid::Uuid;

use crate::methods::{self, CompletionSource};
use crate::session::SessionManager;

/// What happened to a dispatched POST, for the transport layer to turn into
/// an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A notification was processed; respond `202` with an empty body.
    Notification,
    /// A request (successful or not) was queued for delivery; respond `202
    /// {"status":"queued"}`.
    Queued,
}

const RECOGNIZED_NOTIFICATIONS: &[&str] = &[
    "notifications/initialized",
    "notifications/cancelled",
    "notifications/progress",
    "notifications/roots/list_changed",
    "ping",
];

/// Ties the registries, storage, and session manager together to serve one
/// MCP server instance.
pub struct Engine {
    storage: Arc<dyn Storage>,
    registries: Arc<Registries>,
    sessions: SessionManager,
    negotiator: VersionNegotiator,
    config: ServerConfig,
    completion_source: Option<Arc<dyn CompletionSource>>,
}

impl Engine {
    /// Build an engine over the given storage, registries, and config.
    pub fn new(storage: Arc<dyn Storage>, registries: Arc<Registries>, config: ServerConfig) -> Self {
        let negotiator = VersionNegotiator::new(config.supported_versions.clone());
        let sessions = SessionManager::new(
            storage.clone(),
            config.session_lifetime,
            config.max_seen_ids,
        );
        Self {
            storage,
            registries,
            sessions,
            negotiator,
            config,
            completion_source: None,
        }
    }

    /// Attach a `completions/complete` backend.
    pub fn with_completion_source(mut self, source: Arc<dyn CompletionSource>) -> Self {
        self.completion_source = Some(source);
        self
    }

    /// Pre-allocate a session for a GET `/sse` connection, ahead of the
    /// client's `initialize` call, using this server's newest supported
    /// version. `initialize` still renegotiates and is authoritative; this
    /// only reserves the id the SSE endpoint announces.
    pub async fn create_pending_session(
        &self,
        tenant_id: Uuid,
        user_id: Option<String>,
    ) -> Result<String> {
        self.sessions
            .create(self.negotiator.newest(), tenant_id, user_id)
            .await
    }

    /// Handle `initialize`. Synchronous: errors and the result are returned
    /// directly to the caller, not queued.
    pub async fn initialize(
        &self,
        params: Value,
        tenant_id: Uuid,
        user_id: Option<String>,
    ) -> Result<(String, Value)> {
        let client_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol(ErrorCode::InvalidParams, "missing 'protocolVersion'"))?;

        let negotiated = self.negotiator.negotiate(client_version);
        let session_id = self.sessions.create(&negotiated, tenant_id, user_id).await?;

        let result = serde_json::json!({
            "protocolVersion": negotiated,
            "serverInfo": {
                "name": self.config.server_info.name,
                "version": self.config.server_info.version,
            },
            "capabilities": capabilities_for(&negotiated),
        });

        Ok((session_id, result))
    }

    /// Handle every method except `initialize`. Resolves the session,
    /// validates the envelope, and either processes a notification inline
    /// or queues the (possibly erroring) response for the transport's drain
    /// loop to deliver.
    pub async fn dispatch(&self, envelope: RawEnvelope, session_id: &str) -> Result<DispatchOutcome> {
        validate_jsonrpc_version(&envelope)?;
        let id = parse_request_id(&envelope)?;

        let session = self.sessions.resolve(session_id).await?;

        let Some(id) = id else {
            self.handle_notification(&envelope.method);
            return Ok(DispatchOutcome::Notification);
        };

        let fresh = self.sessions.mark_seen(session_id, &id.to_string()).await?;
        if !fresh {
            self.queue_error(session_id, Some(id), ErrorCode::InvalidRequest, "duplicate request id")
                .await?;
            return Ok(DispatchOutcome::Queued);
        }

        if !methods::is_gated_for_version(&envelope.method, &session.protocol_version) {
            self.queue_error(
                session_id,
                Some(id),
                ErrorCode::MethodNotFound,
                format!("method '{}' not available for this protocol version", envelope.method),
            )
            .await?;
            return Ok(DispatchOutcome::Queued);
        }

        let ctx = RequestContext::new(
            session.tenant_id,
            session.user_id.clone(),
            session_id.to_string(),
            session.protocol_version.clone(),
            Some(id.clone()),
        );
        let params = envelope.params.unwrap_or(Value::Null);

        match self
            .process_method(&envelope.method, params, &ctx, &session.protocol_version)
            .await
        {
            Ok(result) => {
                let response = JsonRpcResponse::success(id, result);
                self.storage
                    .enqueue_message(session_id, serde_json::to_value(response)?, self.queue_cap())
                    .await?;
            }
            Err(e) => {
                let response = JsonRpcResponse::error(Some(id), e.into_jsonrpc());
                self.storage
                    .enqueue_message(session_id, serde_json::to_value(response)?, self.queue_cap())
                    .await?;
            }
        }

        Ok(DispatchOutcome::Queued)
    }

    async fn process_method(
        &self,
        method: &str,
        params: Value,
        ctx: &RequestContext,
        protocol_version: &str,
    ) -> Result<Value> {
        match method {
            "ping" => Ok(methods::ping()),
            "tools/list" => Ok(methods::tools_list(&self.registries, protocol_version)),
            "tools/call" => methods::tools_call(&self.registries, params, ctx, protocol_version).await,
            "prompts/list" => Ok(methods::prompts_list(&self.registries)),
            "prompts/get" => methods::prompts_get(&self.registries, params, ctx).await,
            "resources/list" => Ok(methods::resources_list(&self.registries)),
            "resources/templates/list" => Ok(methods::resource_templates_list(&self.registries)),
            "resources/read" => methods::resources_read(&self.registries, params, ctx).await,
            "completions/complete" => {
                methods::completions_complete(
                    self.completion_source.as_deref(),
                    params,
                    ctx,
                )
                .await
            }
            "logging/setLevel" => {
                let level = methods::logging_set_level(&params)?;
                let mut session = self
                    .sessions
                    .resolve(ctx.session_id.as_deref().unwrap_or_default())
                    .await?;
                session.log_level = Some(level.clone());
                self.storage.update_session(session).await?;
                Ok(serde_json::json!({ "level": level }))
            }
            "elicitation/create" => {
                let request_id = Uuid::new_v4().to_string();
                let server_request = mcp_core::jsonrpc::JsonRpcServerRequest {
                    jsonrpc: mcp_core::jsonrpc::JSONRPC_VERSION,
                    method: "elicitation/create".to_string(),
                    params: params.clone(),
                    id: RequestId::String(request_id.clone()),
                };
                self.storage
                    .enqueue_message(
                        ctx.session_id.as_deref().unwrap_or_default(),
                        serde_json::to_value(server_request)?,
                        self.queue_cap(),
                    )
                    .await?;
                Ok(serde_json::json!({ "status": "sent", "requestId": request_id }))
            }
            "elicitation/response" => {
                let request_id = params
                    .get("requestId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::protocol(ErrorCode::InvalidParams, "missing 'requestId'"))?;
                let data = params.get("data").cloned().unwrap_or(Value::Null);
                self.storage
                    .put_oob_response(
                        mcp_storage::OobKind::Elicitation,
                        mcp_storage::OobRecord {
                            session_id: ctx.session_id.clone().unwrap_or_default(),
                            request_id: request_id.to_string(),
                            data,
                            created_at: chrono::Utc::now(),
                        },
                    )
                    .await?;
                Ok(serde_json::json!({ "status": "accepted" }))
            }
            _ => Err(Error::protocol(
                ErrorCode::MethodNotFound,
                format!("method '{method}' not found"),
            )),
        }
    }

    fn handle_notification(&self, method: &str) {
        if !RECOGNIZED_NOTIFICATIONS.contains(&method) {
            tracing::debug!(method, "ignoring unrecognized notification");
        }
    }

    async fn queue_error(
        &self,
        session_id: &str,
        id: Option<RequestId>,
        code: ErrorCode,
        detail: impl Into<String>,
    ) -> Result<()> {
        let response = JsonRpcResponse::error(id, Error::protocol(code, detail).into_jsonrpc());
        self.storage
            .enqueue_message(session_id, serde_json::to_value(response)?, self.queue_cap())
            .await
    }

    /// Soft cap applied to a session's outbound queue regardless of which
    /// transport drains it; the larger of the two configured caps, since the
    /// queue itself is shared across the SSE and streamable-HTTP endpoints.
    fn queue_cap(&self) -> usize {
        self.config
            .sse
            .queue_soft_cap
            .max(self.config.streamable_http.queue_soft_cap)
    }
}

fn validate_jsonrpc_version(envelope: &RawEnvelope) -> Result<()> {
    match envelope.jsonrpc.as_ref().and_then(Value::as_str) {
        Some("2.0") => Ok(()),
        _ => Err(Error::protocol(ErrorCode::InvalidRequest, "jsonrpc must be \"2.0\"")),
    }
}

fn parse_request_id(envelope: &RawEnvelope) -> Result<Option<RequestId>> {
    match &envelope.id {
        None => Ok(None),
        Some(Value::Null) => Err(Error::protocol(ErrorCode::InvalidRequest, "id must not be null")),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|n| Some(RequestId::Number(n)))
            .ok_or_else(|| Error::protocol(ErrorCode::InvalidRequest, "id number out of range")),
        Some(Value::String(s)) => Ok(Some(RequestId::String(s.clone()))),
        Some(_) => Err(Error::protocol(ErrorCode::InvalidRequest, "id must be a string or number")),
    }
}

fn capabilities_for(protocol_version: &str) -> Value {
    let mut caps = serde_json::json!({
        "tools": { "listChanged": true },
        "prompts": { "listChanged": true },
        "resources": { "subscribe": false, "listChanged": true },
        "logging": {},
        "roots": {},
        "sampling": {},
        "ping": {},
    });
    let obj = caps.as_object_mut().expect("object literal");

    if VersionNegotiator::supports_completions(protocol_version) {
        obj.insert("completions".to_string(), serde_json::json!({}));
        obj.insert("toolAnnotations".to_string(), serde_json::json!({}));
        obj.insert("audio".to_string(), serde_json::json!({ "hints": true }));
    }
    if VersionNegotiator::supports_elicitation(protocol_version) {
        obj.insert("elicitation".to_string(), serde_json::json!({}));
        obj.insert("structuredOutputs".to_string(), serde_json::json!({}));
        obj.insert("resourceLinks".to_string(), serde_json::json!({}));
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_storage::MemoryStorage;

    fn engine() -> Engine {
        Engine::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(Registries::new()),
            ServerConfig::default(),
        )
    }

    fn envelope(method: &str, id: Option<Value>) -> RawEnvelope {
        RawEnvelope {
            jsonrpc: Some(Value::String("2.0".to_string())),
            method: method.to_string(),
            params: None,
            id,
        }
    }

    #[tokio::test]
    async fn initialize_negotiates_and_creates_session() {
        let engine = engine();
        let (session_id, result) = engine
            .initialize(
                serde_json::json!({"protocolVersion": "2025-06-18"}),
                Uuid::new_v4(),
                None,
            )
            .await
            .unwrap();
        assert!(session_id.starts_with("2025-06-18_"));
        assert_eq!(result["protocolVersion"], "2025-06-18");
        assert!(result["capabilities"]["elicitation"].is_object());
    }

    #[tokio::test]
    async fn missing_protocol_version_is_invalid_params() {
        let engine = engine();
        let err = engine
            .initialize(serde_json::json!({}), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn notification_without_id_is_not_queued() {
        let engine = engine();
        let (session_id, _) = engine
            .initialize(
                serde_json::json!({"protocolVersion": "2025-06-18"}),
                Uuid::new_v4(),
                None,
            )
            .await
            .unwrap();

        let outcome = engine
            .dispatch(envelope("notifications/initialized", None), &session_id)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Notification);
        assert_eq!(engine.storage.queue_depth(&session_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ping_is_queued_for_delivery() {
        let engine = engine();
        let (session_id, _) = engine
            .initialize(
                serde_json::json!({"protocolVersion": "2025-06-18"}),
                Uuid::new_v4(),
                None,
            )
            .await
            .unwrap();

        let outcome = engine
            .dispatch(envelope("ping", Some(Value::Number(1.into()))), &session_id)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Queued);
        assert_eq!(engine.storage.queue_depth(&session_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_request_id_yields_invalid_request_error() {
        let engine = engine();
        let (session_id, _) = engine
            .initialize(
                serde_json::json!({"protocolVersion": "2025-06-18"}),
                Uuid::new_v4(),
                None,
            )
            .await
            .unwrap();

        engine
            .dispatch(envelope("ping", Some(Value::Number(1.into()))), &session_id)
            .await
            .unwrap();
        engine
            .dispatch(envelope("ping", Some(Value::Number(1.into()))), &session_id)
            .await
            .unwrap();

        let messages = engine.storage.list_messages(&session_id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].payload["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected_synchronously() {
        let engine = engine();
        let err = engine
            .dispatch(
                envelope("ping", Some(Value::Number(1.into()))),
                "2025-06-18_deadbeef",
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionRequired);
    }

    #[tokio::test]
    async fn elicitation_gated_by_version() {
        let engine = engine();
        let (session_id, _) = engine
            .initialize(
                serde_json::json!({"protocolVersion": "2024-11-05"}),
                Uuid::new_v4(),
                None,
            )
            .await
            .unwrap();

        engine
            .dispatch(
                envelope("elicitation/create", Some(Value::Number(1.into()))),
                &session_id,
            )
            .await
            .unwrap();
        let messages = engine.storage.list_messages(&session_id, 10).await.unwrap();
        assert_eq!(messages[0].payload["error"]["code"], -32601);
    }
}
