//! Server configuration.
//!
//! Deserializable via `serde` so the binary can load it from file/env with
//! the `config` crate; every field carries a sensible default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Canonical origin used in resource URLs and discovery documents.
    pub base_url: String,
    /// Supported protocol versions, newest first.
    pub supported_versions: Vec<String>,
    /// Name/version reported in `initialize`.
    pub server_info: ServerInfo,
    /// Session TTL in seconds.
    pub session_lifetime: u64,
    /// Maximum number of request ids retained per session; the seen-id set
    /// is bounded to avoid unbounded growth on a long-lived session.
    pub max_seen_ids: usize,
    /// Authentication/authorization configuration.
    pub auth: AuthConfig,
    /// SSE transport configuration.
    pub sse: StreamConfig,
    /// Streamable-HTTP transport configuration (≥2025-03-26).
    pub streamable_http: StreamConfig,
    /// Storage driver configuration (opaque to the engine).
    pub storage: StorageConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            supported_versions: vec![
                "2025-06-18".to_string(),
                "2025-03-26".to_string(),
                "2024-11-05".to_string(),
            ],
            server_info: ServerInfo::default(),
            session_lifetime: 3600,
            max_seen_ids: 4096,
            auth: AuthConfig::default(),
            sse: StreamConfig::default(),
            streamable_http: StreamConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// `serverInfo` reported in `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "agency-mcpd".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Authentication/authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When true, skip the resource-server middleware entirely and attach
    /// a fixed public tenant context to every request.
    pub authless: bool,
    /// Context types a route may bind to (`agency`, `user`, ...).
    pub context_types: Vec<String>,
    /// Whether to enforce `required_scopes` against issued token scope.
    pub validate_scope: bool,
    /// Scopes required when `validate_scope` is set.
    pub required_scopes: Vec<String>,
    /// Enforce RFC 8707 resource binding (see `require_resource_binding_for`
    /// for the per-version override).
    pub require_resource_binding: bool,
    /// Configurable OAuth endpoint paths.
    pub oauth_endpoints: OAuthEndpoints,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authless: false,
            context_types: vec!["agency".to_string(), "user".to_string()],
            validate_scope: false,
            required_scopes: Vec::new(),
            require_resource_binding: true,
            oauth_endpoints: OAuthEndpoints::default(),
        }
    }
}

impl AuthConfig {
    /// Resource binding is mandatory for 2025-06-18 sessions regardless of
    /// the static flag; older protocol versions follow the flag.
    pub fn require_resource_binding_for(&self, protocol_version: &str) -> bool {
        protocol_version >= "2025-06-18" || self.require_resource_binding
    }
}

/// Path map for the OAuth authorization-server endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthEndpoints {
    /// `GET /oauth/authorize`.
    pub authorize: String,
    /// `POST /oauth/verify`.
    pub verify: String,
    /// `POST /oauth/consent`.
    pub consent: String,
    /// `POST /oauth/token`.
    pub token: String,
    /// `POST /oauth/revoke`.
    pub revoke: String,
    /// `POST /oauth/register`.
    pub register: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorize: "/oauth/authorize".to_string(),
            verify: "/oauth/verify".to_string(),
            consent: "/oauth/consent".to_string(),
            token: "/oauth/token".to_string(),
            revoke: "/oauth/revoke".to_string(),
            register: "/oauth/register".to_string(),
        }
    }
}

/// SSE / streamable-HTTP drain-loop configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds between keepalive comments while the queue is idle.
    pub keepalive_interval_secs: u64,
    /// Maximum seconds a single drain connection stays open.
    pub max_connection_time_secs: u64,
    /// Seconds of consecutive idleness before the interval is backed off.
    pub switch_interval_after_secs: u64,
    /// Ceiling multiplier applied to the keepalive interval under backoff.
    pub backoff_ceiling_multiplier: u64,
    /// Soft cap on queued-but-undelivered messages per session before the
    /// oldest are dropped.
    pub queue_soft_cap: usize,
    /// When true, the drain loop performs exactly one pass and returns
    /// instead of looping, so tests don't stall.
    pub test_mode: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: 15,
            max_connection_time_secs: 300,
            switch_interval_after_secs: 60,
            backoff_ceiling_multiplier: 4,
            queue_soft_cap: 1024,
            test_mode: false,
        }
    }
}

/// Storage driver selection; fields beyond `driver` are opaque to the
/// engine and passed through to the chosen `Storage` implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Driver identifier (`"memory"` is the only one shipped here; durable
    /// drivers live outside this workspace).
    pub driver: String,
    /// Opaque driver-specific settings (connection strings, pool sizes...).
    pub options: BTreeMap<String, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            options: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.session_lifetime, 3600);
        assert_eq!(
            cfg.supported_versions,
            vec!["2025-06-18", "2025-03-26", "2024-11-05"]
        );
        assert!(cfg.auth.require_resource_binding);
    }

    #[test]
    fn resource_binding_always_on_for_2025_06_18() {
        let mut cfg = AuthConfig::default();
        cfg.require_resource_binding = false;
        assert!(cfg.require_resource_binding_for("2025-06-18"));
        assert!(!cfg.require_resource_binding_for("2024-11-05"));
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let json = serde_json::json!({ "base_url": "https://mcp.example.com" });
        let cfg: ServerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(cfg.base_url, "https://mcp.example.com");
        assert_eq!(cfg.session_lifetime, 3600);
    }
}
