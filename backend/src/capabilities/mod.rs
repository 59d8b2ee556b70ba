//! Capability registry: the tools, resources and prompts a session can invoke.
//!
//! Every capability is a pure function from validated input to output content.
//! The protocol engine looks capabilities up by name (tools, prompts) or by
//! URI (resources, possibly through a `{variable}` template).

pub mod builtin;
pub mod handler;
pub mod registry;
pub mod uri_template;

pub use handler::{CapabilityError, PromptRenderer, ResourceReader, ToolHandler};
pub use registry::CapabilityRegistry;
pub use uri_template::UriTemplate;
