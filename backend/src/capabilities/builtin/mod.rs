//! Built-in capabilities organized by kind.

pub mod arithmetic;
pub mod greeting;
pub mod math_problem;
pub mod time;

use crate::capabilities::registry::CapabilityRegistry;
use crate::capabilities::uri_template::UriTemplateError;
use abacus_types::Implementation;

/// Identity reported in the `initialize` result.
pub fn server_info() -> Implementation {
    Implementation::new("Demo", "1.0.0")
}

/// Register every built-in capability.
pub fn register_all(registry: CapabilityRegistry) -> Result<CapabilityRegistry, UriTemplateError> {
    let mut registry = registry;

    // Add arithmetic tools
    for (tool, handler) in arithmetic::get_tools() {
        registry = registry.with_tool(tool, handler);
    }

    // Add resources
    registry = registry.with_resource(time::resource(), time::CurrentTime);
    registry = registry.with_resource_template(greeting::template(), greeting::Greeting)?;

    // Add prompts
    registry = registry.with_prompt(math_problem::prompt(), math_problem::MathProblem);

    Ok(registry)
}
