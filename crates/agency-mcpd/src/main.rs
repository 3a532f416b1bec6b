//! Binary entrypoint: load config, wire storage/engine/auth/transport, and
//! serve HTTP until shutdown.

mod cli;
mod logging;

use std::sync::Arc;

use clap::Parser;
use config::{Config, Environment, File};
use mcp_auth::AuthServer;
use mcp_core::config::ServerConfig;
use mcp_engine::Engine;
use mcp_registry::Registries;
use mcp_storage::{MemoryStorage, Storage};
use mcp_transport::{build_router, AppState};
use serde::Deserialize;

use cli::Args;
use logging::LoggingConfig;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AppConfig {
    #[serde(flatten)]
    server: ServerConfig,
    logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut app_config = load_config(&args)?;

    if let Some(level) = &args.log_level {
        app_config.logging.level = level.clone();
    }
    if let Some(base_url) = &args.base_url {
        app_config.server.base_url = base_url.clone();
    }

    let _logging_guard = app_config.logging.init()?;

    tracing::info!(bind = %args.bind, base_url = %app_config.server.base_url, "starting agency-mcpd");

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let registries = Arc::new(Registries::new());

    let engine = Arc::new(Engine::new(storage.clone(), registries, app_config.server.clone()));
    let auth = Arc::new(AuthServer::new(storage.clone(), app_config.server.clone()));

    let state = AppState {
        engine,
        auth,
        storage,
        config: app_config.server,
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut builder = Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(File::from(path.clone()));
    }
    builder = builder.add_source(Environment::with_prefix("AGENCY_MCPD").separator("__"));
    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
