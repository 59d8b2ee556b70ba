//! MCP protocol engine.
//!
//! One engine serves one session. It performs the `initialize` handshake and then
//! dispatches JSON-RPC requests to the capability registry. The engine never touches
//! I/O: it returns a [`Dispatch`] that the transport writes out.

use crate::capabilities::{CapabilityError, CapabilityRegistry};
use abacus_types::jsonrpc::error_codes;
use abacus_types::protocol::{
    CallToolParams, GetPromptParams, InitializeParams, InitializeResult, LoggingMessageParams,
    ReadResourceParams, SetLevelParams,
};
use abacus_types::{
    Implementation, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    LoggingLevel, ServerCapabilities, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Server not initialized")]
    NotInitialized,

    #[error("Server already initialized")]
    AlreadyInitialized,

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("Failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// JSON-RPC error code reported to the client.
    pub fn code(&self) -> i32 {
        match self {
            EngineError::NotInitialized | EngineError::AlreadyInitialized => {
                error_codes::INVALID_REQUEST
            }
            EngineError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            EngineError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            EngineError::Capability(CapabilityError::ResourceNotFound(_)) => {
                error_codes::RESOURCE_NOT_FOUND
            }
            EngineError::Capability(_) => error_codes::INVALID_PARAMS,
            EngineError::Serialization(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

/// Handshake progress of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No `initialize` request has succeeded yet.
    AwaitingInitialize,
    /// `initialize` answered, waiting for `notifications/initialized`.
    Initialized,
    /// The client confirmed the handshake.
    Ready,
}

/// Everything produced by handling one inbound message.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Reply for requests; `None` for notifications and client responses.
    pub response: Option<JsonRpcResponse>,
    /// Server-initiated notifications to deliver on the session's outbound channel.
    pub notifications: Vec<JsonRpcNotification>,
    /// Set when this message completed the `initialize` handshake.
    pub handshake_completed: bool,
}

/// Per-session protocol state machine.
pub struct McpEngine {
    capabilities: Arc<CapabilityRegistry>,
    phase: EnginePhase,
    protocol_version: Option<String>,
    client_info: Option<Implementation>,
    log_level: Option<LoggingLevel>,
}

impl McpEngine {
    pub fn new(capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            capabilities,
            phase: EnginePhase::AwaitingInitialize,
            protocol_version: None,
            client_info: None,
            log_level: None,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != EnginePhase::AwaitingInitialize
    }

    /// Protocol revision agreed during the handshake.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    pub fn client_info(&self) -> Option<&Implementation> {
        self.client_info.as_ref()
    }

    /// Minimum level set by `logging/setLevel`; no log notifications are sent while unset.
    pub fn log_level(&self) -> Option<LoggingLevel> {
        self.log_level
    }

    /// Handle one inbound message.
    pub fn handle(&mut self, message: JsonRpcMessage) -> Dispatch {
        match message {
            JsonRpcMessage::Response(response) => {
                debug!("MCP: Ignoring client response for id {}", response.id);
                Dispatch::default()
            }
            JsonRpcMessage::Request(request) if request.is_notification() => {
                self.handle_notification(&request);
                Dispatch::default()
            }
            JsonRpcMessage::Request(request) => self.handle_request(request),
        }
    }

    fn handle_request(&mut self, request: JsonRpcRequest) -> Dispatch {
        let id = request.id.unwrap_or(Value::Null);
        debug!("MCP: Handling method: {}", request.method);

        let mut notifications = Vec::new();
        let mut handshake_completed = false;

        let result = match request.method.as_str() {
            "initialize" => {
                let result = self.initialize(request.params);
                handshake_completed = result.is_ok();
                result
            }
            "ping" => Ok(json!({})),
            _ if !self.is_initialized() => Err(EngineError::NotInitialized),
            method => self.dispatch(method, request.params, &mut notifications),
        };

        let response = match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                warn!("MCP: {} failed: {}", request.method, e);
                JsonRpcResponse::error(id, e.code(), e.to_string())
            }
        };

        Dispatch {
            response: Some(response),
            notifications,
            handshake_completed,
        }
    }

    fn handle_notification(&mut self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                if self.phase == EnginePhase::Initialized {
                    self.phase = EnginePhase::Ready;
                    debug!("MCP: Client confirmed initialization");
                }
            }
            "notifications/cancelled" => {
                // Requests complete synchronously, nothing to cancel
                debug!("MCP: Client cancelled a request");
            }
            other => debug!("MCP: Ignoring notification {}", other),
        }
    }

    fn initialize(&mut self, params: Option<Value>) -> Result<Value, EngineError> {
        if self.is_initialized() {
            return Err(EngineError::AlreadyInitialized);
        }
        let params: InitializeParams = parse_params(params)?;

        let protocol_version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str())
        {
            params.protocol_version
        } else {
            debug!(
                "MCP: Client requested unsupported protocol {}, offering {}",
                params.protocol_version, LATEST_PROTOCOL_VERSION
            );
            LATEST_PROTOCOL_VERSION.to_string()
        };

        info!(
            "MCP: Initializing for client {} {} (protocol {})",
            params.client_info.name, params.client_info.version, protocol_version
        );

        let result = InitializeResult {
            protocol_version: protocol_version.clone(),
            capabilities: self.server_capabilities(),
            server_info: self.capabilities.server_info().clone(),
            instructions: self.capabilities.instructions().map(str::to_string),
        };
        let value = serde_json::to_value(result)?;

        self.phase = EnginePhase::Initialized;
        self.protocol_version = Some(protocol_version);
        self.client_info = Some(params.client_info);
        Ok(value)
    }

    fn server_capabilities(&self) -> ServerCapabilities {
        let enabled = |on: bool| on.then(|| json!({}));
        ServerCapabilities {
            tools: enabled(self.capabilities.has_tools()),
            resources: enabled(self.capabilities.has_resources()),
            prompts: enabled(self.capabilities.has_prompts()),
            logging: Some(json!({})),
        }
    }

    fn dispatch(
        &mut self,
        method: &str,
        params: Option<Value>,
        notifications: &mut Vec<JsonRpcNotification>,
    ) -> Result<Value, EngineError> {
        let registry = &self.capabilities;

        match method {
            "tools/list" => Ok(json!({ "tools": registry.list_tools() })),
            "tools/call" => {
                let params: CallToolParams = parse_params(params)?;
                let arguments = params.arguments.unwrap_or_default();
                let result = registry.call_tool(&params.name, &arguments)?;
                info!(
                    "MCP: Tool {} returned{}",
                    params.name,
                    if result.is_error { " an error result" } else { "" }
                );
                notifications.extend(self.log_message(
                    LoggingLevel::Info,
                    "tools",
                    json!(format!("Called tool {}", params.name)),
                ));
                Ok(serde_json::to_value(result)?)
            }
            "resources/list" => Ok(json!({ "resources": registry.list_resources() })),
            "resources/templates/list" => {
                Ok(json!({ "resourceTemplates": registry.list_resource_templates() }))
            }
            "resources/read" => {
                let params: ReadResourceParams = parse_params(params)?;
                Ok(serde_json::to_value(registry.read_resource(&params.uri)?)?)
            }
            "prompts/list" => Ok(json!({ "prompts": registry.list_prompts() })),
            "prompts/get" => {
                let params: GetPromptParams = parse_params(params)?;
                let arguments = params.arguments.unwrap_or_default();
                Ok(serde_json::to_value(
                    registry.get_prompt(&params.name, &arguments)?,
                )?)
            }
            "logging/setLevel" => {
                let params: SetLevelParams = parse_params(params)?;
                info!("MCP: Log level set to {:?}", params.level);
                self.log_level = Some(params.level);
                Ok(json!({}))
            }
            other => Err(EngineError::MethodNotFound(other.to_string())),
        }
    }

    /// Build a `notifications/message` if `level` passes the session's log level.
    fn log_message(&self, level: LoggingLevel, logger: &str, data: Value) -> Option<JsonRpcNotification> {
        let minimum = self.log_level?;
        if level < minimum {
            return None;
        }
        let params = LoggingMessageParams {
            level,
            logger: Some(logger.to_string()),
            data,
        };
        serde_json::to_value(params)
            .ok()
            .map(|params| JsonRpcNotification::new("notifications/message", Some(params)))
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, EngineError> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
        .map_err(|e| EngineError::InvalidParams(e.to_string()))
}
