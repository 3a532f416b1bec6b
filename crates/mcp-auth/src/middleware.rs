//! Resource-server middleware: bearer-token validation and RFC 8707
//! resource-binding enforcement for every request to an MCP endpoint.

use chrono::{Duration, Utc};
use mcp_core::config::ServerConfig;
use mcp_core::{Error, ErrorCode, Result};
use mcp_storage::{AccessToken, ContextType, Storage, TenantContext, TokenContext};
use uuid::Uuid;

use crate::discovery::oauth_discovery_urls;

/// The resolved tenant/token context attached to a request once
/// authentication succeeds.
#[derive(Debug, Clone)]
pub struct AuthedContext {
    /// The tenant the request is scoped to.
    pub tenant: TenantContext,
    /// The validated token record.
    pub token: AccessToken,
    /// Which kind of route parameter the UUID was bound to.
    pub context_type: ContextType,
}

/// Authenticate a request against `uuid`/`context_type`, enforcing RFC 8707
/// resource binding when the session's negotiated `protocol_version`
/// requires it (2025-06-18 sessions always do).
///
/// `protocol_version` is `None` before a session exists (e.g. the
/// `initialize` call itself), in which case resource binding is skipped --
/// the session doesn't have a negotiated version to bind against yet.
pub async fn authenticate(
    storage: &dyn Storage,
    config: &ServerConfig,
    context_type: ContextType,
    uuid: Uuid,
    bearer_token: Option<&str>,
    protocol_version: Option<&str>,
) -> Result<AuthedContext> {
    if config.auth.authless {
        return Ok(public_context(config, context_type, uuid));
    }

    let Some(bearer_token) = bearer_token else {
        return Err(auth_required(config));
    };

    let tenant = storage
        .get_tenant(uuid)
        .await?
        .filter(|t| t.active)
        .ok_or_else(|| auth_required(config))?;

    let token = storage
        .validate_token(bearer_token, TokenContext { context_type, uuid })
        .await?
        .ok_or_else(|| auth_required(config))?;

    if let Some(version) = protocol_version {
        if config.auth.require_resource_binding_for(version) {
            let expected = format!("{}/mcp/{}", config.base_url, uuid);
            if !token.binds_to(uuid, &expected) {
                return Err(auth_required(config));
            }
        }
    }

    if config.auth.validate_scope && !config.auth.required_scopes.is_empty() {
        let granted: Vec<&str> = token.scope.split(' ').collect();
        let satisfied = config
            .auth
            .required_scopes
            .iter()
            .all(|s| granted.contains(&s.as_str()));
        if !satisfied {
            return Err(auth_required(config));
        }
    }

    Ok(AuthedContext {
        tenant,
        token,
        context_type,
    })
}

fn auth_required(config: &ServerConfig) -> Error {
    Error::protocol_with_data(
        ErrorCode::AuthRequired,
        "Authentication required",
        serde_json::json!({ "oauth": oauth_discovery_urls(config) }),
    )
}

/// The fixed public tenant/token context attached to every request when
/// `config.auth.authless` is set, bypassing storage lookups and bearer-token
/// validation entirely.
fn public_context(config: &ServerConfig, context_type: ContextType, uuid: Uuid) -> AuthedContext {
    let resource = format!("{}/mcp/{}", config.base_url, uuid);
    let now = Utc::now();
    AuthedContext {
        tenant: TenantContext {
            id: 0,
            uuid,
            display_name: "public".to_string(),
            active: true,
        },
        token: AccessToken {
            access_token: "authless".to_string(),
            refresh_token: String::new(),
            client_id: "authless".to_string(),
            tenant_id: uuid,
            user_id: "public".to_string(),
            scope: String::new(),
            resource: resource.clone(),
            aud: vec![resource],
            issued_at: now,
            expires_at: now + Duration::days(365 * 10),
            revoked: false,
        },
        context_type,
    }
}
