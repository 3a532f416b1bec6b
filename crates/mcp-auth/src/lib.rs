//! OAuth 2.1 authorization server, resource-server middleware, PKCE, and
//! well-known discovery documents for the agency MCP server.

pub mod discovery;
pub mod middleware;
pub mod pkce;
pub mod server;

pub use middleware::{authenticate, AuthedContext};
pub use server::{AuthServer, AuthorizeRequest, AuthorizationCodeGrant, RefreshTokenGrant, RegisterClientRequest, TokenResponse};
