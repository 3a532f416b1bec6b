//! Protocol version negotiation.

/// The MCP protocol versions this workspace recognizes feature-gating for.
pub const KNOWN_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];

/// Negotiates a single protocol version for a connection and answers
/// feature-gating questions against the configured supported-version list.
///
/// `supported` must be ordered newest-first; this is a caller invariant
/// (checked in `new`) since date-lexicographic comparison assumes it.
#[derive(Debug, Clone)]
pub struct VersionNegotiator {
    /// Supported versions, newest first.
    supported: Vec<String>,
}

impl VersionNegotiator {
    /// Build a negotiator over an explicit, newest-first version list.
    ///
    /// Panics if `supported` is empty or not sorted newest-first -- this is
    /// a configuration bug, not a runtime condition.
    pub fn new(supported: Vec<String>) -> Self {
        assert!(
            !supported.is_empty(),
            "VersionNegotiator requires at least one supported version"
        );
        for pair in supported.windows(2) {
            assert!(
                pair[0] >= pair[1],
                "supported_versions must be ordered newest-first (date-lexicographic)"
            );
        }
        Self { supported }
    }

    /// The default negotiator: `["2025-06-18", "2025-03-26", "2024-11-05"]`.
    pub fn default_supported() -> Self {
        Self::new(
            KNOWN_VERSIONS
                .iter()
                .rev()
                .map(|v| v.to_string())
                .collect(),
        )
    }

    /// The newest version this server supports.
    pub fn newest(&self) -> &str {
        &self.supported[0]
    }

    /// The oldest version this server supports.
    pub fn oldest(&self) -> &str {
        &self.supported[self.supported.len() - 1]
    }

    /// Is `version` one of the versions this server explicitly supports?
    pub fn is_supported(&self, version: &str) -> bool {
        self.supported.iter().any(|v| v == version)
    }

    /// Negotiate a version for an incoming `initialize` request.
    ///
    /// 1. Exact match in the supported list wins.
    /// 2. A client offering something newer than our newest gets our newest.
    /// 3. Anything older than our oldest (or otherwise unrecognized) gets
    ///    our oldest, as a best-effort fallback for legacy clients.
    pub fn negotiate(&self, client_version: &str) -> String {
        if self.is_supported(client_version) {
            return client_version.to_string();
        }
        if client_version > self.newest() {
            return self.newest().to_string();
        }
        self.oldest().to_string()
    }

    /// Does `version` support tool/resource annotations (≥2025-03-26)?
    pub fn supports_annotations(version: &str) -> bool {
        version >= "2025-03-26"
    }

    /// Does `version` support declared tool output schemas (≥2025-06-18)?
    pub fn supports_output_schema(version: &str) -> bool {
        version >= "2025-06-18"
    }

    /// Does `version` support `completions/complete` (≥2025-03-26)?
    pub fn supports_completions(version: &str) -> bool {
        version >= "2025-03-26"
    }

    /// Does `version` support elicitation and structured tool output
    /// (≥2025-06-18)?
    pub fn supports_elicitation(version: &str) -> bool {
        version >= "2025-06-18"
    }

    /// Does `version` use the streamable-HTTP transport fold-in
    /// (≥2025-03-26), as opposed to plain SSE only?
    pub fn supports_streamable_http(version: &str) -> bool {
        version >= "2025-03-26"
    }
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::default_supported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiator() -> VersionNegotiator {
        VersionNegotiator::default_supported()
    }

    #[test]
    fn exact_match_wins() {
        assert_eq!(negotiator().negotiate("2025-03-26"), "2025-03-26");
    }

    #[test]
    fn future_version_falls_back_to_newest() {
        assert_eq!(negotiator().negotiate("2099-01-01"), "2025-06-18");
    }

    #[test]
    fn ancient_version_falls_back_to_oldest() {
        assert_eq!(negotiator().negotiate("1999-01-01"), "2024-11-05");
    }

    #[test]
    fn feature_gates_are_monotonic() {
        assert!(!VersionNegotiator::supports_annotations("2024-11-05"));
        assert!(VersionNegotiator::supports_annotations("2025-03-26"));
        assert!(VersionNegotiator::supports_annotations("2025-06-18"));

        assert!(!VersionNegotiator::supports_output_schema("2025-03-26"));
        assert!(VersionNegotiator::supports_output_schema("2025-06-18"));
    }

    #[test]
    #[should_panic(expected = "newest-first")]
    fn rejects_misordered_supported_list() {
        VersionNegotiator::new(vec!["2024-11-05".into(), "2025-06-18".into()]);
    }
}
