//! Prompt registration, lookup, and argument-schema projection.

use async_trait::async_trait;
use mcp_core::{Error, ErrorCode, RequestContext, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A single prompt argument, as projected into MCP wire format from the
/// prompt's JSON Schema.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PromptArgument {
    /// Argument name (the JSON Schema property key).
    pub name: String,
    /// Description, when the schema supplies one.
    pub description: Option<String>,
    /// Whether this property is listed under the schema's `required` array.
    pub required: bool,
    /// The JSON Schema `type` keyword's value, when scalar.
    #[serde(rename = "type")]
    pub arg_type: Option<String>,
}

/// A prompt implementation.
#[async_trait]
pub trait Prompt: Send + Sync {
    /// Prompt name, unique within the registry.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema describing accepted arguments; walked into
    /// [`PromptArgument`]s for the wire listing.
    fn argument_schema(&self) -> Value;

    /// Render the prompt's messages for the given arguments.
    async fn render(&self, args: Value, ctx: &RequestContext) -> Result<Value>;
}

/// Walk a JSON Schema object into the MCP `arguments` array
/// (`properties`/`required` → `[{name, description, required, type}]`).
pub fn schema_to_arguments(schema: &Value) -> Vec<PromptArgument> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| PromptArgument {
            name: name.clone(),
            description: prop
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            required: required.contains(&name.as_str()),
            arg_type: prop.get("type").and_then(Value::as_str).map(str::to_string),
        })
        .collect()
}

/// Registry of prompts, keyed by name.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: HashMap<String, Arc<dyn Prompt>>,
}

impl PromptRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt implementation.
    pub fn register(&mut self, prompt: Arc<dyn Prompt>) {
        self.prompts.insert(prompt.name().to_string(), prompt);
    }

    /// Look up a prompt by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Prompt>> {
        self.prompts.get(name).cloned()
    }

    /// All registered prompts.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Prompt>> {
        self.prompts.values()
    }

    /// Render `name` with `args`, or `MethodNotFound` if it isn't registered.
    pub async fn render(
        &self,
        name: &str,
        args: Value,
        ctx: &RequestContext,
    ) -> Result<Value> {
        let prompt = self.get(name).ok_or_else(|| {
            Error::protocol(ErrorCode::MethodNotFound, format!("prompt '{name}' not found"))
        })?;
        prompt.render(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_walk_marks_required_and_type() {
        let schema = serde_json::json!({
            "properties": {
                "topic": {"type": "string", "description": "subject line"},
                "tone": {"type": "string"}
            },
            "required": ["topic"]
        });
        let args = schema_to_arguments(&schema);
        let topic = args.iter().find(|a| a.name == "topic").unwrap();
        assert!(topic.required);
        assert_eq!(topic.description.as_deref(), Some("subject line"));
        let tone = args.iter().find(|a| a.name == "tone").unwrap();
        assert!(!tone.required);
    }

    #[test]
    fn schema_with_no_properties_yields_empty_arguments() {
        assert!(schema_to_arguments(&serde_json::json!({})).is_empty());
    }
}
