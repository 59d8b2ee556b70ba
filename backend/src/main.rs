//! Abacus MCP server over Streamable HTTP.

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use abacus::{
    config::{CliOverrides, Config},
    create_app_with_state,
    logging::{self, LogTarget},
    state::AppState,
};

/// Abacus - MCP calculator server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "ABACUS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "ABACUS_PORT")]
    port: Option<u16>,

    /// Path of the MCP endpoint
    #[arg(long)]
    path: Option<String>,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(CliOverrides {
        host: args.host,
        port: args.port,
        path: args.path,
        log_level: args.log_level,
    })?;

    // Keep the guard alive so the log file is flushed on exit
    let _log_guard = logging::init(&config.logging, LogTarget::Stdout)?;
    info!("Configuration loaded");

    let state = AppState::from_config(&config)?;
    let app = create_app_with_state(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        "MCP server listening on http://{}{}",
        listener.local_addr()?,
        config.path
    );

    // Open SSE streams would hold graceful shutdown forever, so sessions are
    // closed as soon as the signal arrives.
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
        state.shutdown().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server stopped");
    Ok(())
}
