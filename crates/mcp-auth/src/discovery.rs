//! Well-known discovery documents: RFC 8414 authorization-server metadata
//! and RFC 9728 protected-resource metadata.

use mcp_core::config::{AuthConfig, ServerConfig};
use serde_json::{json, Value};

/// Build the `/.well-known/oauth-authorization-server` document.
pub fn authorization_server_metadata(config: &ServerConfig) -> Value {
    let endpoints = &config.auth.oauth_endpoints;
    let mut doc = json!({
        "issuer": config.base_url,
        "authorization_endpoint": format!("{}{}", config.base_url, endpoints.authorize),
        "token_endpoint": format!("{}{}", config.base_url, endpoints.token),
        "registration_endpoint": format!("{}{}", config.base_url, endpoints.register),
        "revocation_endpoint": format!("{}{}", config.base_url, endpoints.revoke),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
        "scopes_supported": scopes_supported(&config.auth),
    });

    if config.auth.require_resource_binding {
        let obj = doc.as_object_mut().expect("object literal");
        obj.insert("resource_indicators_supported".to_string(), json!(true));
        obj.insert("require_resource_parameter".to_string(), json!(true));
        obj.insert("pkce_required".to_string(), json!(true));
    }

    doc
}

/// Build the `/.well-known/oauth-protected-resource` document for the MCP
/// endpoint rooted at `resource_url` (`<base_url>/mcp/<uuid>`).
pub fn protected_resource_metadata(config: &ServerConfig, resource_url: &str) -> Value {
    json!({
        "resource": resource_url,
        "authorization_servers": [config.base_url],
        "bearer_methods_supported": ["header"],
        "scopes_supported": scopes_supported(&config.auth),
        "audience_validation_required": true,
        "mcp_features_supported": supported_features(config),
    })
}

fn scopes_supported(auth: &AuthConfig) -> Vec<String> {
    if auth.required_scopes.is_empty() {
        vec!["mcp".to_string()]
    } else {
        auth.required_scopes.clone()
    }
}

fn supported_features(config: &ServerConfig) -> Vec<&'static str> {
    use mcp_core::VersionNegotiator;

    let newest = config
        .supported_versions
        .first()
        .map(String::as_str)
        .unwrap_or("2024-11-05");

    let mut features = vec!["tools", "prompts", "resources", "logging"];
    if VersionNegotiator::supports_completions(newest) {
        features.push("completions");
    }
    if VersionNegotiator::supports_elicitation(newest) {
        features.push("elicitation");
        features.push("structuredOutputs");
    }
    if VersionNegotiator::supports_streamable_http(newest) {
        features.push("streamableHttp");
    }
    features
}

/// Build the `data.oauth` block attached to 401 responses, pointing clients
/// at discovery.
pub fn oauth_discovery_urls(config: &ServerConfig) -> Value {
    let endpoints = &config.auth.oauth_endpoints;
    json!({
        "authorization_endpoint": format!("{}{}", config.base_url, endpoints.authorize),
        "token_endpoint": format!("{}{}", config.base_url, endpoints.token),
        "registration_endpoint": format!("{}{}", config.base_url, endpoints.register),
        "resource_metadata": format!("{}/.well-known/oauth-protected-resource", config.base_url),
    })
}
