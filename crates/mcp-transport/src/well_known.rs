//! Handlers for the RFC 8414 / RFC 9728 well-known discovery documents.

use axum::extract::{Query, State};
use axum::response::Json;
use mcp_auth::discovery;
use serde::Deserialize;
use serde_json::Value;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    resource: Option<String>,
}

pub async fn authorization_server_metadata(State(state): State<AppState>) -> Json<Value> {
    Json(discovery::authorization_server_metadata(&state.config))
}

/// `GET /.well-known/oauth-protected-resource?resource=<url>`. Falls back to
/// the bare `base_url` when no specific MCP endpoint is named, matching how
/// a client probes discovery before it knows which tenant it's talking to.
pub async fn protected_resource_metadata(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> Json<Value> {
    let resource = query.resource.unwrap_or_else(|| state.config.base_url.clone());
    Json(discovery::protected_resource_metadata(&state.config, &resource))
}
