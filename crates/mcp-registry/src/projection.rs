//! Version-gated projection of registry contents into MCP wire format.

use mcp_core::VersionNegotiator;
use serde_json::{json, Value};

use crate::prompt::{schema_to_arguments, PromptRegistry};
use crate::resource::ResourceRegistry;
use crate::tool::ToolRegistry;

/// Project `tools/list`: always name/description/inputSchema; `annotations`
/// from 2025-03-26; `outputSchema` from 2025-06-18.
pub fn project_tools(registry: &ToolRegistry, protocol_version: &str) -> Value {
    let mut tools: Vec<Value> = registry
        .iter()
        .map(|tool| {
            let mut entry = json!({
                "name": tool.name(),
                "description": tool.description(),
                "inputSchema": tool.input_schema(),
            });
            let obj = entry.as_object_mut().expect("object literal");
            if VersionNegotiator::supports_annotations(protocol_version) {
                if let Some(annotations) = tool.annotations() {
                    obj.insert("annotations".to_string(), annotations);
                }
            }
            if VersionNegotiator::supports_output_schema(protocol_version) {
                if let Some(output_schema) = tool.output_schema() {
                    obj.insert("outputSchema".to_string(), output_schema);
                }
            }
            entry
        })
        .collect();
    tools.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    json!({ "tools": tools })
}

/// Project `prompts/list`: `inputSchema` is walked into the MCP `arguments`
/// array, not emitted directly.
pub fn project_prompts(registry: &PromptRegistry) -> Value {
    let mut prompts: Vec<Value> = registry
        .iter()
        .map(|prompt| {
            json!({
                "name": prompt.name(),
                "description": prompt.description(),
                "arguments": schema_to_arguments(&prompt.argument_schema()),
            })
        })
        .collect();
    prompts.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    json!({ "prompts": prompts })
}

/// Project `resources/list`: static entries only.
pub fn project_resources(registry: &ResourceRegistry) -> Value {
    let mut resources: Vec<Value> = registry
        .static_iter()
        .map(|resource| {
            json!({
                "uri": resource.uri(),
                "name": resource.name(),
                "description": resource.description(),
                "mimeType": resource.mime_type(),
            })
        })
        .collect();
    resources.sort_by(|a, b| a["uri"].as_str().cmp(&b["uri"].as_str()));
    json!({ "resources": resources })
}

/// Project `resources/templates/list`: template entries only.
pub fn project_resource_templates(registry: &ResourceRegistry) -> Value {
    let mut templates: Vec<Value> = registry
        .template_iter()
        .map(|resource| {
            json!({
                "uriTemplate": resource.uri(),
                "name": resource.name(),
                "description": resource.description(),
                "mimeType": resource.mime_type(),
            })
        })
        .collect();
    templates.sort_by(|a, b| a["uriTemplate"].as_str().cmp(&b["uriTemplate"].as_str()));
    json!({ "resourceTemplates": templates })
}
