//! Abacus MCP server over stdio.
//!
//! Speaks newline-delimited JSON-RPC on stdin/stdout with a single session.
//! Logs go to stderr so they never corrupt the protocol stream.

use std::sync::Arc;
use tracing::info;

use abacus::{
    capabilities::CapabilityRegistry,
    config::{CliOverrides, Config},
    logging::{self, LogTarget},
    mcp::{stdio, McpEngine},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_figment(CliOverrides::default())?;
    let _log_guard = logging::init(&config.logging, LogTarget::Stderr)?;

    let capabilities = Arc::new(CapabilityRegistry::builtin()?);
    info!(
        "Starting {} {} MCP server on stdio",
        capabilities.server_info().name,
        capabilities.server_info().version
    );

    let engine = McpEngine::new(capabilities);
    stdio::serve(engine, tokio::io::stdin(), tokio::io::stdout()).await?;

    info!("Stdin closed, exiting");
    Ok(())
}
