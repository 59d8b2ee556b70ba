//! MCP (Model Context Protocol) server core.
//!
//! - [`engine`] holds the per-session protocol state machine.
//! - [`transport`] adapts an engine to the Streamable HTTP transport.
//! - [`registry`] maps session IDs to live transports.
//! - [`stdio`] runs an engine over newline-delimited stdin/stdout.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC messages
//! - `GET /mcp` - Open SSE stream for server messages
//! - `DELETE /mcp` - Terminate session
//!
//! Sessions are identified by the `mcp-session-id` header, assigned when the
//! `initialize` handshake succeeds and required on every later request.

pub mod engine;
pub mod registry;
pub mod stdio;
pub mod transport;

pub use engine::{Dispatch, EngineError, EnginePhase, McpEngine};
pub use registry::{SessionError, TransportRegistry};
pub use transport::{SessionConfig, SessionState, SessionTransport};
