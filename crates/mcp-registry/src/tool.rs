//! Tool registration and lookup.

use async_trait::async_trait;
use mcp_core::{Error, ErrorCode, RequestContext, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A tool implementation. Mirrors the "full object implementing a capability
/// interface" registration style; a handler registered via
/// [`ToolRegistry::register_fn`] is adapted to this trait internally.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within the registry.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema describing accepted arguments.
    fn input_schema(&self) -> Value;

    /// JSON Schema describing the return value, when the tool declares one.
    fn output_schema(&self) -> Option<Value> {
        None
    }

    /// Wire annotations (`readOnlyHint`, `destructiveHint`, ...), surfaced
    /// only to clients negotiating protocol version ≥2025-03-26.
    fn annotations(&self) -> Option<Value> {
        None
    }

    /// Invoke the tool. The returned value is wrapped by the engine per the
    /// tool-call result contract; it is not a JSON-RPC envelope itself.
    async fn execute(&self, args: Value, ctx: &RequestContext) -> Result<Value>;
}

struct FnTool {
    name: String,
    description: String,
    input_schema: Value,
    output_schema: Option<Value>,
    handler: Arc<dyn Fn(Value, &RequestContext) -> Result<Value> + Send + Sync>,
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    fn output_schema(&self) -> Option<Value> {
        self.output_schema.clone()
    }

    async fn execute(&self, args: Value, ctx: &RequestContext) -> Result<Value> {
        (self.handler)(args, ctx)
    }
}

/// Registry of tools, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a full [`Tool`] implementation.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Register a plain closure as a tool, the lightweight registration
    /// style for handlers with no extra state.
    pub fn register_fn(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: impl Fn(Value, &RequestContext) -> Result<Value> + Send + Sync + 'static,
    ) {
        let name = name.into();
        self.tools.insert(
            name.clone(),
            Arc::new(FnTool {
                name,
                description: description.into(),
                input_schema,
                output_schema: None,
                handler: Arc::new(handler),
            }),
        );
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All registered tools, in registration order is not guaranteed; callers
    /// that need a stable order should sort by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    /// Invoke `name` with `args`, or `MethodNotFound` if it isn't registered.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &RequestContext,
    ) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::protocol(ErrorCode::MethodNotFound, format!("tool '{name}' not found")))?;
        tool.execute(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx() -> RequestContext {
        RequestContext::for_initialize(Uuid::new_v4(), None, "2025-06-18".to_string(), None)
    }

    #[tokio::test]
    async fn register_fn_and_execute_round_trips() {
        let mut reg = ToolRegistry::new();
        reg.register_fn("echo", "echoes input", serde_json::json!({}), |args, _ctx| {
            Ok(args)
        });
        let out = reg
            .execute("echo", serde_json::json!({"a": 1}), &ctx())
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn missing_tool_is_method_not_found() {
        let reg = ToolRegistry::new();
        let err = reg.execute("nope", Value::Null, &ctx()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MethodNotFound);
    }
}
