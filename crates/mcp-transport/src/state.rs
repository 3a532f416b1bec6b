//! Shared application state handed to every axum handler.

use std::sync::Arc;

use mcp_auth::AuthServer;
use mcp_core::config::ServerConfig;
use mcp_engine::Engine;
use mcp_storage::Storage;

/// Everything a handler needs: the dispatch engine, the auth server, the
/// raw storage handle (for middleware that runs ahead of the engine), and
/// the resolved config.
#[derive(Clone)]
pub struct AppState {
    /// The JSON-RPC dispatch engine.
    pub engine: Arc<Engine>,
    /// The OAuth 2.1 authorization-server logic.
    pub auth: Arc<AuthServer>,
    /// Raw storage handle, used by the resource-server middleware.
    pub storage: Arc<dyn Storage>,
    /// Resolved server configuration.
    pub config: ServerConfig,
}
