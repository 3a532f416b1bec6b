//! Wraps a tool handler's raw return value into the MCP `tools/call` result
//! shape.

use mcp_core::VersionNegotiator;
use serde_json::{json, Value};

/// Wrap `value` (a tool handler's return) into a `tools/call` result.
///
/// - Always carries `content: [{type:"text", text: <JSON of value>}]`.
/// - If `value` is already an object with a `content` array (explicit
///   multi-part/audio result), it passes through unchanged instead.
/// - From 2025-06-18, if `value._meta.structured == true` or the tool
///   declares an `outputSchema`, a top-level `structuredContent` mirrors
///   `value`; `resourceLinks` is lifted from `value._meta.resourceLinks`
///   when present.
pub fn wrap_tool_result(value: Value, protocol_version: &str, has_output_schema: bool) -> Value {
    if let Some(obj) = value.as_object() {
        if obj.get("content").is_some_and(Value::is_array) {
            return value;
        }
    }

    let text = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
    let mut result = json!({
        "content": [{ "type": "text", "text": text }],
    });

    if VersionNegotiator::supports_elicitation(protocol_version) {
        let meta = value.get("_meta");
        let is_structured = meta.and_then(|m| m.get("structured")).and_then(Value::as_bool) == Some(true);
        if is_structured || has_output_schema {
            result["structuredContent"] = value.clone();
        }
        if let Some(links) = meta.and_then(|m| m.get("resourceLinks")) {
            result["resourceLinks"] = links.clone();
        }
    }

    result
}
