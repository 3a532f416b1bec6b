//! Axum routing for the MCP endpoint, OAuth endpoints, and well-known
//! discovery documents.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use mcp_auth::middleware::authenticate;
use mcp_core::jsonrpc::RawEnvelope;
use mcp_core::{Error, ErrorCode};
use mcp_storage::ContextType;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::oauth_routes;
use crate::sse::drain_stream;
use crate::state::AppState;
use crate::well_known;

/// Build the full axum router for one server instance.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/mcp/{uuid}",
            post(post_mcp).get(get_streamable).fallback(unsupported_method),
        )
        .route(
            "/mcp/{uuid}/{session_id}",
            post(post_mcp_with_session).fallback(unsupported_method),
        )
        .route("/mcp/{uuid}/sse", get(get_sse).fallback(unsupported_method))
        .route(
            "/.well-known/oauth-authorization-server",
            get(well_known::authorization_server_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(well_known::protected_resource_metadata),
        )
        .route(
            "/oauth/authorize",
            get(oauth_routes::authorize).post(oauth_routes::authorize),
        )
        .route("/oauth/verify", post(oauth_routes::verify))
        .route("/oauth/consent", post(oauth_routes::consent))
        .route("/oauth/token", post(oauth_routes::token))
        .route("/oauth/revoke", post(oauth_routes::revoke))
        .route("/oauth/register", post(oauth_routes::register))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn session_id_from(headers: &HeaderMap, path_session_id: Option<&str>) -> Option<String> {
    if let Some(id) = path_session_id {
        return Some(id.to_string());
    }
    headers
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn post_mcp(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    handle_post(state, uuid, None, headers, body).await
}

async fn post_mcp_with_session(
    State(state): State<AppState>,
    Path((uuid, session_id)): Path<(Uuid, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    handle_post(state, uuid, Some(session_id), headers, body).await
}

async fn handle_post(
    state: AppState,
    uuid: Uuid,
    path_session_id: Option<String>,
    headers: HeaderMap,
    body: Value,
) -> Response {
    let is_initialize = body.get("method").and_then(Value::as_str) == Some("initialize");
    let session_protocol_version = if is_initialize {
        None
    } else {
        protocol_version_for_auth(&state, &headers, path_session_id.as_deref()).await
    };

    let authed = match authenticate(
        state.storage.as_ref(),
        &state.config,
        ContextType::Agency,
        uuid,
        bearer_token(&headers),
        session_protocol_version.as_deref(),
    )
    .await
    {
        Ok(authed) => authed,
        Err(e) => return error_response(e),
    };

    if is_initialize {
        let params = body.get("params").cloned().unwrap_or(Value::Null);
        return match state
            .engine
            .initialize(params, authed.tenant.uuid, Some(authed.token.user_id.clone()))
            .await
        {
            Ok((session_id, result)) => {
                let mut response = Json(json!({
                    "jsonrpc": "2.0",
                    "result": result,
                    "id": body.get("id").cloned().unwrap_or(Value::Null),
                }))
                .into_response();
                if let Ok(value) = session_id.parse::<axum::http::HeaderValue>() {
                    response.headers_mut().insert("Mcp-Session-Id", value);
                }
                response
            }
            Err(e) => error_response(e),
        };
    }

    let Some(session_id) = session_id_from(&headers, path_session_id.as_deref()) else {
        return error_response(Error::protocol(ErrorCode::SessionRequired, "session required"));
    };

    let envelope: RawEnvelope = match serde_json::from_value(body) {
        Ok(envelope) => envelope,
        Err(_) => return error_response(Error::protocol(ErrorCode::ParseError, "invalid JSON-RPC envelope")),
    };

    match state.engine.dispatch(envelope, &session_id).await {
        Ok(mcp_engine::DispatchOutcome::Notification) => StatusCode::ACCEPTED.into_response(),
        Ok(mcp_engine::DispatchOutcome::Queued) => {
            (StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Resolve the protocol version the resource-binding check should enforce
/// against, for the request in flight. `initialize` has no session yet, so
/// its caller skips this lookup entirely.
async fn protocol_version_for_auth(
    state: &AppState,
    headers: &HeaderMap,
    path_session_id: Option<&str>,
) -> Option<String> {
    let session_id = session_id_from(headers, path_session_id)?;
    let session = state.storage.get_session(&session_id).await.ok().flatten()?;
    Some(session.protocol_version)
}

async fn get_streamable(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    if !wants_event_stream(&headers) {
        return error_response(Error::protocol(
            ErrorCode::UnsupportedHttpMethod,
            "GET requires Accept: text/event-stream",
        ));
    }

    if let Err(e) = authenticate(
        state.storage.as_ref(),
        &state.config,
        ContextType::Agency,
        uuid,
        bearer_token(&headers),
        None,
    )
    .await
    {
        return error_response(e);
    }

    let Some(session_id) = session_id_from(&headers, None) else {
        // B3: a GET to a streaming endpoint with no session id is HTTP 400,
        // not the 404 a resolved-but-unknown session gets elsewhere.
        return error_response_with_status(
            Error::protocol(ErrorCode::SessionRequired, "session required"),
            StatusCode::BAD_REQUEST,
        );
    };

    drain_stream(
        state.storage.clone(),
        session_id,
        state.config.streamable_http,
        None,
    )
    .into_response()
}

async fn get_sse(State(state): State<AppState>, Path(uuid): Path<Uuid>, headers: HeaderMap) -> Response {
    let authed = match authenticate(
        state.storage.as_ref(),
        &state.config,
        ContextType::Agency,
        uuid,
        bearer_token(&headers),
        None,
    )
    .await
    {
        Ok(authed) => authed,
        Err(e) => return error_response(e),
    };

    let session_id = match state
        .engine
        .create_pending_session(authed.tenant.uuid, Some(authed.token.user_id.clone()))
        .await
    {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    let post_url = format!("{}/mcp/{}/{}", state.config.base_url, uuid, session_id);

    drain_stream(state.storage.clone(), session_id, state.config.sse, Some(post_url)).into_response()
}

/// Catches any HTTP verb not explicitly routed on `/mcp/*` (PUT, DELETE, ...)
/// and surfaces it as a JSON-RPC error rather than axum's bare 405.
async fn unsupported_method() -> Response {
    error_response(Error::protocol(
        ErrorCode::UnsupportedHttpMethod,
        "unsupported HTTP method for this endpoint; use GET for SSE/streamable delivery or POST for JSON-RPC requests",
    ))
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

fn error_response(error: Error) -> Response {
    let status = match error.code() {
        ErrorCode::AuthRequired => StatusCode::UNAUTHORIZED,
        ErrorCode::SessionRequired => StatusCode::NOT_FOUND,
        // §7: an unsupported/unknown HTTP verb surfaces as 400, not 405.
        ErrorCode::UnsupportedHttpMethod => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    error_response_with_status(error, status)
}

fn error_response_with_status(error: Error, status: StatusCode) -> Response {
    let body = Json(json!({
        "jsonrpc": "2.0",
        "error": error.into_jsonrpc(),
        "id": Value::Null,
    }));
    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use mcp_auth::AuthServer;
    use mcp_core::config::ServerConfig;
    use mcp_engine::Engine;
    use mcp_registry::Registries;
    use mcp_storage::{AccessToken, MemoryStorage, Storage as _, TenantContext};
    use tower::ServiceExt;

    use super::*;

    const RESOURCE_BASE: &str = "https://mcp.example.com";

    async fn test_state(uuid: Uuid) -> (AppState, String) {
        let storage = MemoryStorage::new();
        storage.seed_tenant(TenantContext {
            id: 1,
            uuid,
            display_name: "Acme".to_string(),
            active: true,
        });

        let access_token = "test-token".to_string();
        let resource = format!("{RESOURCE_BASE}/mcp/{uuid}");
        let token = AccessToken {
            access_token: access_token.clone(),
            refresh_token: "test-refresh".to_string(),
            client_id: "client-1".to_string(),
            tenant_id: uuid,
            user_id: "user-1".to_string(),
            scope: "mcp".to_string(),
            resource: resource.clone(),
            aud: vec![resource],
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
            revoked: false,
        };

        let storage: Arc<dyn mcp_storage::Storage> = Arc::new(storage);
        storage.put_token(token).await.unwrap();

        let mut config = ServerConfig::default();
        config.base_url = RESOURCE_BASE.to_string();
        config.sse.test_mode = true;
        config.streamable_http.test_mode = true;

        let engine = Arc::new(Engine::new(storage.clone(), Arc::new(Registries::new()), config.clone()));
        let auth = Arc::new(AuthServer::new(storage.clone(), config.clone()));

        (
            AppState {
                engine,
                auth,
                storage,
                config,
            },
            access_token,
        )
    }

    #[tokio::test]
    async fn initialize_without_bearer_token_is_unauthorized() {
        let uuid = Uuid::new_v4();
        let (state, _token) = test_state(uuid).await;
        let router = build_router(state);

        let req = Request::post(format!("/mcp/{uuid}"))
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "jsonrpc": "2.0",
                    "method": "initialize",
                    "params": {"protocolVersion": "2025-06-18"},
                    "id": 1,
                }))
                .unwrap(),
            ))
            .unwrap();

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn initialize_then_ping_round_trips_through_the_queue() {
        let uuid = Uuid::new_v4();
        let (state, token) = test_state(uuid).await;
        let router = build_router(state);

        let init_req = Request::post(format!("/mcp/{uuid}"))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "jsonrpc": "2.0",
                    "method": "initialize",
                    "params": {"protocolVersion": "2025-06-18"},
                    "id": 1,
                }))
                .unwrap(),
            ))
            .unwrap();

        let init_response = router.clone().oneshot(init_req).await.unwrap();
        assert_eq!(init_response.status(), StatusCode::OK);
        let session_id = init_response
            .headers()
            .get("mcp-session-id")
            .expect("session id header")
            .to_str()
            .unwrap()
            .to_string();
        assert!(session_id.starts_with("2025-06-18_"));

        let ping_req = Request::post(format!("/mcp/{uuid}/{session_id}"))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "jsonrpc": "2.0",
                    "method": "ping",
                    "id": 2,
                }))
                .unwrap(),
            ))
            .unwrap();

        let ping_response = router.clone().oneshot(ping_req).await.unwrap();
        assert_eq!(ping_response.status(), StatusCode::ACCEPTED);

        let drain_req = Request::get(format!("/mcp/{uuid}"))
            .header("accept", "text/event-stream")
            .header("authorization", format!("Bearer {token}"))
            .header("mcp-session-id", &session_id)
            .body(Body::empty())
            .unwrap();

        let drain_response = router.oneshot(drain_req).await.unwrap();
        assert_eq!(drain_response.status(), StatusCode::OK);
        let body = to_bytes(drain_response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("\"id\":2"));
    }

    #[tokio::test]
    async fn dispatch_without_session_header_is_not_found() {
        let uuid = Uuid::new_v4();
        let (state, token) = test_state(uuid).await;
        let router = build_router(state);

        let req = Request::post(format!("/mcp/{uuid}"))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "jsonrpc": "2.0",
                    "method": "ping",
                    "id": 1,
                }))
                .unwrap(),
            ))
            .unwrap();

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn streamable_get_without_event_stream_accept_is_bad_request() {
        let uuid = Uuid::new_v4();
        let (state, token) = test_state(uuid).await;
        let router = build_router(state);

        let req = Request::get(format!("/mcp/{uuid}"))
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32002);
    }

    #[tokio::test]
    async fn streamable_get_without_session_id_is_bad_request() {
        let uuid = Uuid::new_v4();
        let (state, token) = test_state(uuid).await;
        let router = build_router(state);

        let req = Request::get(format!("/mcp/{uuid}"))
            .header("accept", "text/event-stream")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32001);
    }

    #[tokio::test]
    async fn put_to_mcp_endpoint_is_bad_request_with_unsupported_method_error() {
        let uuid = Uuid::new_v4();
        let (state, token) = test_state(uuid).await;
        let router = build_router(state);

        let req = Request::put(format!("/mcp/{uuid}"))
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], -32002);
    }

    #[tokio::test]
    async fn delete_to_mcp_endpoint_is_bad_request_with_unsupported_method_error() {
        let uuid = Uuid::new_v4();
        let (state, token) = test_state(uuid).await;
        let router = build_router(state);

        let req = Request::delete(format!("/mcp/{uuid}"))
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
