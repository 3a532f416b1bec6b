//! Resource registration, lookup, and URI-template dispatch.

use async_trait::async_trait;
use mcp_core::{Error, ErrorCode, RequestContext, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A static resource (fixed URI) or a template (one or more `{name}`
/// placeholders).
#[async_trait]
pub trait Resource: Send + Sync {
    /// The resource's URI, or its template, e.g. `"agency://{id}/profile"`.
    fn uri(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Description, when supplied.
    fn description(&self) -> Option<&str> {
        None
    }

    /// MIME type of the resource contents, when known statically.
    fn mime_type(&self) -> Option<&str> {
        None
    }

    /// Read the resource. `matched_uri` is the concrete URI that matched
    /// (equal to `self.uri()` for static resources; the request URI itself
    /// for templates).
    async fn read(&self, matched_uri: &str, ctx: &RequestContext) -> Result<Value>;
}

/// Does `template` (e.g. `"agency://{id}/profile"`) match `uri`? Each
/// `{placeholder}` matches exactly one non-`/` segment unless it is the
/// template's last segment, in which case it greedily matches the rest.
pub fn template_matches(template: &str, uri: &str) -> bool {
    let t_segs: Vec<&str> = template.split('/').collect();
    let u_segs: Vec<&str> = uri.split('/').collect();

    for (i, t_seg) in t_segs.iter().enumerate() {
        let is_placeholder = t_seg.starts_with('{') && t_seg.ends_with('}');
        let is_last = i == t_segs.len() - 1;

        if is_placeholder && is_last {
            return u_segs.len() >= t_segs.len();
        }

        let Some(u_seg) = u_segs.get(i) else {
            return false;
        };
        if !is_placeholder && u_seg != t_seg {
            return false;
        }
    }
    u_segs.len() == t_segs.len()
}

/// Registry of resources: static entries looked up by exact URI, and
/// templates matched in registration order (first match wins).
#[derive(Default)]
pub struct ResourceRegistry {
    static_entries: HashMap<String, Arc<dyn Resource>>,
    templates: Vec<Arc<dyn Resource>>,
}

impl ResourceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Entries whose `uri()` contains `{` are treated
    /// as templates; everything else is a static entry.
    pub fn register(&mut self, resource: Arc<dyn Resource>) {
        if resource.uri().contains('{') {
            self.templates.push(resource);
        } else {
            self.static_entries
                .insert(resource.uri().to_string(), resource);
        }
    }

    /// Static entries, for the `resources/list` projection.
    pub fn static_iter(&self) -> impl Iterator<Item = &Arc<dyn Resource>> {
        self.static_entries.values()
    }

    /// Templates, for the `resources/templates/list` projection.
    pub fn template_iter(&self) -> impl Iterator<Item = &Arc<dyn Resource>> {
        self.templates.iter()
    }

    /// Resolve `uri` to a resource: exact match first, then the first
    /// matching template.
    pub fn resolve(&self, uri: &str) -> Option<Arc<dyn Resource>> {
        if let Some(r) = self.static_entries.get(uri) {
            return Some(r.clone());
        }
        self.templates
            .iter()
            .find(|r| template_matches(r.uri(), uri))
            .cloned()
    }

    /// Read `uri`, or `InvalidParams` if nothing matches (resources have no
    /// dedicated "not found" code; the spec treats this as a method-specific
    /// parameter error).
    pub async fn read(&self, uri: &str, ctx: &RequestContext) -> Result<Value> {
        let resource = self
            .resolve(uri)
            .ok_or_else(|| Error::protocol(ErrorCode::InvalidParams, format!("no resource matches '{uri}'")))?;
        resource.read(uri, ctx).await
    }
}
