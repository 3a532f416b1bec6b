//! Handlers for every dispatched JSON-RPC method.

use async_trait::async_trait;
use chrono::Utc;
use mcp_core::{Error, ErrorCode, RequestContext, Result, VersionNegotiator};
use mcp_registry::{projection, Registries};
use serde_json::{json, Value};

use crate::tool_wrap::wrap_tool_result;

/// Pluggable `completions/complete` backend. The registries don't model
/// completion sources directly since they aren't tools/prompts/resources.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Produce completion candidates for the given reference/argument.
    async fn complete(&self, params: Value, ctx: &RequestContext) -> Result<Value>;
}

/// `ping`.
pub fn ping() -> Value {
    json!({ "status": "pong", "timestamp": Utc::now().to_rfc3339() })
}

/// `tools/list`.
pub fn tools_list(registries: &Registries, protocol_version: &str) -> Value {
    projection::project_tools(&registries.tools, protocol_version)
}

/// `tools/call`.
pub async fn tools_call(
    registries: &Registries,
    params: Value,
    ctx: &RequestContext,
    protocol_version: &str,
) -> Result<Value> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::protocol(ErrorCode::InvalidParams, "missing 'name'"))?;
    let args = params.get("arguments").cloned().unwrap_or(Value::Null);

    let has_output_schema = registries
        .tools
        .get(name)
        .is_some_and(|t| t.output_schema().is_some());

    let result = registries.tools.execute(name, args, ctx).await?;
    Ok(wrap_tool_result(result, protocol_version, has_output_schema))
}

/// `prompts/list`.
pub fn prompts_list(registries: &Registries) -> Value {
    projection::project_prompts(&registries.prompts)
}

/// `prompts/get`.
pub async fn prompts_get(registries: &Registries, params: Value, ctx: &RequestContext) -> Result<Value> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::protocol(ErrorCode::InvalidParams, "missing 'name'"))?;
    let args = params.get("arguments").cloned().unwrap_or(Value::Null);
    registries.prompts.render(name, args, ctx).await
}

/// `resources/list`.
pub fn resources_list(registries: &Registries) -> Value {
    projection::project_resources(&registries.resources)
}

/// `resources/templates/list`.
pub fn resource_templates_list(registries: &Registries) -> Value {
    projection::project_resource_templates(&registries.resources)
}

/// `resources/read`.
pub async fn resources_read(registries: &Registries, params: Value, ctx: &RequestContext) -> Result<Value> {
    let uri = params
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::protocol(ErrorCode::InvalidParams, "missing 'uri'"))?;
    registries.resources.read(uri, ctx).await
}

/// `completions/complete` (≥2025-03-26).
pub async fn completions_complete(
    source: Option<&(dyn CompletionSource)>,
    params: Value,
    ctx: &RequestContext,
) -> Result<Value> {
    let source = source
        .ok_or_else(|| Error::protocol(ErrorCode::MethodNotFound, "no completion source configured"))?;
    source.complete(params, ctx).await
}

/// `logging/setLevel`. Returns the level that was set, for the caller to
/// persist on the session.
pub fn logging_set_level(params: &Value) -> Result<String> {
    params
        .get("level")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::protocol(ErrorCode::InvalidParams, "missing 'level'"))
}

/// Is `method` recognized and allowed under `protocol_version`?
pub fn is_gated_for_version(method: &str, protocol_version: &str) -> bool {
    match method {
        "completions/complete" => VersionNegotiator::supports_completions(protocol_version),
        "elicitation/create" | "elicitation/response" => {
            VersionNegotiator::supports_elicitation(protocol_version)
        }
        _ => true,
    }
}
