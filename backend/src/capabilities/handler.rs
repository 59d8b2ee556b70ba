//! Handler traits implemented by individual capabilities.

use abacus_types::{CallToolResult, GetPromptResult, ReadResourceResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Tool {0} not found")]
    UnknownTool(String),

    #[error("Invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Resource {0} not found")]
    ResourceNotFound(String),

    #[error("Prompt {0} not found")]
    UnknownPrompt(String),
}

/// A callable tool.
///
/// Argument validation failures are returned as [`CapabilityError::InvalidArguments`];
/// domain failures (like dividing by zero) are returned as an error-flagged
/// [`CallToolResult`].
pub trait ToolHandler: Send + Sync {
    fn call(&self, arguments: &Map<String, Value>) -> Result<CallToolResult, CapabilityError>;
}

/// Reads a resource. `variables` holds the values captured by a URI template and is
/// empty for static resources.
pub trait ResourceReader: Send + Sync {
    fn read(
        &self,
        uri: &str,
        variables: &HashMap<String, String>,
    ) -> Result<ReadResourceResult, CapabilityError>;
}

/// Renders a prompt template from its arguments.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, arguments: &HashMap<String, String>)
        -> Result<GetPromptResult, CapabilityError>;
}
