//! API handlers.

pub mod index;
pub mod mcp;
