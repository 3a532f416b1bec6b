//! Axum HTTP routing and the SSE / streamable-HTTP async response pipeline
//! for the agency MCP server.

pub mod oauth_routes;
pub mod routes;
pub mod sse;
pub mod state;
pub mod well_known;

pub use routes::build_router;
pub use state::AppState;
