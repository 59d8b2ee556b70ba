//! Application state management.

use crate::capabilities::CapabilityRegistry;
use crate::config::Config;
use crate::mcp::{SessionConfig, SessionTransport, TransportRegistry};
use std::sync::Arc;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Live MCP sessions, indexed by session ID
    registry: TransportRegistry,
    /// Tools, resources and prompts shared by every session
    capabilities: Arc<CapabilityRegistry>,
    /// Settings applied to each new session transport
    session_config: SessionConfig,
    /// Origins accepted in addition to localhost
    allowed_origins: Vec<String>,
    /// Path the MCP endpoint is mounted on
    endpoint_path: String,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        capabilities: CapabilityRegistry,
        session_config: SessionConfig,
        allowed_origins: Vec<String>,
        endpoint_path: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registry: TransportRegistry::new(),
                capabilities: Arc::new(capabilities),
                session_config,
                allowed_origins,
                endpoint_path: endpoint_path.into(),
            }),
        }
    }

    /// Create state with the built-in capabilities, configured from `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            CapabilityRegistry::builtin()?,
            config.session_config(),
            config.allowed_origins.clone(),
            config.path.clone(),
        ))
    }

    /// Get the transport registry.
    pub fn registry(&self) -> &TransportRegistry {
        &self.inner.registry
    }

    /// Get the capability registry.
    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.inner.capabilities
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.inner.session_config
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.inner.allowed_origins
    }

    pub fn endpoint_path(&self) -> &str {
        &self.inner.endpoint_path
    }

    /// Create a `Pending` transport for a new session.
    ///
    /// It is only registered once its `initialize` handshake succeeds.
    pub fn new_transport(&self) -> Arc<SessionTransport> {
        SessionTransport::new(
            self.inner.registry.clone(),
            Arc::clone(&self.inner.capabilities),
            self.inner.session_config.clone(),
        )
    }

    /// Close every session. Called on server shutdown.
    pub async fn shutdown(&self) {
        let closed = self.inner.registry.close_all().await;
        info!("Shutdown complete, {} session(s) closed", closed);
    }
}

impl Default for AppState {
    fn default() -> Self {
        let config = Config::default();
        // The built-in templates are static and always parse
        let capabilities = CapabilityRegistry::builtin()
            .unwrap_or_else(|_| CapabilityRegistry::new(crate::capabilities::builtin::server_info()));
        Self::new(
            capabilities,
            config.session_config(),
            config.allowed_origins,
            config.path,
        )
    }
}
