//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Multi-tenant MCP server: JSON-RPC over HTTP with SSE/streamable-HTTP
/// delivery and OAuth 2.1 resource-server protection.
#[derive(Debug, Parser)]
#[command(name = "agency-mcpd", version, about)]
pub struct Args {
    /// Path to a config file (TOML/YAML/JSON, resolved by extension).
    #[arg(short, long, env = "AGENCY_MCPD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP listener to.
    #[arg(long, env = "AGENCY_MCPD_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Override `base_url` from the config (used in resource URLs and
    /// discovery documents).
    #[arg(long, env = "AGENCY_MCPD_BASE_URL")]
    pub base_url: Option<String>,

    /// Override the logging level directive.
    #[arg(long, env = "AGENCY_MCPD_LOG_LEVEL")]
    pub log_level: Option<String>,
}
