//! The JSON-RPC dispatch engine: session lifecycle, envelope validation,
//! method dispatch, and tool-call result wrapping.

pub mod dispatch;
pub mod methods;
pub mod session;
pub mod tool_wrap;

pub use dispatch::{DispatchOutcome, Engine};
pub use methods::CompletionSource;
pub use session::SessionManager;
