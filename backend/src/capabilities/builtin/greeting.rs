//! Templated greeting resource: `greeting://{name}`.

use crate::capabilities::handler::{CapabilityError, ResourceReader};
use abacus_types::{ReadResourceResult, ResourceContents, ResourceTemplate};
use std::collections::HashMap;

pub fn template() -> ResourceTemplate {
    ResourceTemplate {
        uri_template: "greeting://{name}".to_string(),
        name: "greeting".to_string(),
        mime_type: None,
    }
}

/// Returns a personalized greeting for the captured `name`.
pub struct Greeting;

impl ResourceReader for Greeting {
    fn read(
        &self,
        uri: &str,
        variables: &HashMap<String, String>,
    ) -> Result<ReadResourceResult, CapabilityError> {
        let name = variables
            .get("name")
            .ok_or_else(|| CapabilityError::ResourceNotFound(uri.to_string()))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: uri.to_string(),
                mime_type: None,
                text: format!("Hello, {}!", name),
            }],
        })
    }
}
