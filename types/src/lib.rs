//! Shared protocol types for the Abacus MCP server.
//!
//! This crate contains the JSON-RPC envelope and the MCP payload types used by
//! the HTTP server and the stdio server.

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 3000;

/// Default path of the Streamable HTTP endpoint.
pub const DEFAULT_ENDPOINT_PATH: &str = "/mcp";

/// Header carrying the session identifier on every request after `initialize`.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

pub mod jsonrpc;
pub mod protocol;

// Re-export commonly used types
pub use jsonrpc::{
    error_codes, is_initialize_request, JsonRpcError, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION,
};
pub use protocol::{
    CallToolResult, Content, GetPromptResult, Implementation, LoggingLevel, Prompt,
    PromptArgument, PromptMessage, ReadResourceResult, Resource, ResourceContents,
    ResourceTemplate, Role, ServerCapabilities, Tool, LATEST_PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS,
};
