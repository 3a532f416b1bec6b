//! Tool, prompt, and resource registries, plus the version-gated wire
//! projection the engine uses to answer `*/list` requests.

pub mod projection;
pub mod prompt;
pub mod resource;
pub mod tool;

pub use prompt::{Prompt, PromptArgument, PromptRegistry};
pub use resource::{Resource, ResourceRegistry};
pub use tool::{Tool, ToolRegistry};

/// The three registries a server instance owns, bundled for convenient
/// passing-around; the engine borrows from this rather than owning each
/// registry separately.
#[derive(Default)]
pub struct Registries {
    /// Tool registry.
    pub tools: ToolRegistry,
    /// Prompt registry.
    pub prompts: PromptRegistry,
    /// Resource registry.
    pub resources: ResourceRegistry,
}

impl Registries {
    /// Three empty registries.
    pub fn new() -> Self {
        Self::default()
    }
}
