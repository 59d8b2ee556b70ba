//! Registry combining capability definitions with their handlers.

use crate::capabilities::builtin;
use crate::capabilities::handler::{
    CapabilityError, PromptRenderer, ResourceReader, ToolHandler,
};
use crate::capabilities::uri_template::{UriTemplate, UriTemplateError};
use abacus_types::{
    CallToolResult, GetPromptResult, Implementation, Prompt, ReadResourceResult, Resource,
    ResourceTemplate, Tool,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
struct ToolEntry {
    definition: Tool,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Clone)]
struct ResourceEntry {
    resource: Resource,
    reader: Arc<dyn ResourceReader>,
}

#[derive(Clone)]
struct TemplateEntry {
    template: ResourceTemplate,
    matcher: UriTemplate,
    reader: Arc<dyn ResourceReader>,
}

#[derive(Clone)]
struct PromptEntry {
    prompt: Prompt,
    renderer: Arc<dyn PromptRenderer>,
}

/// Immutable table of everything a protocol engine can invoke.
///
/// Built once at startup and shared by every session behind an `Arc`.
#[derive(Clone)]
pub struct CapabilityRegistry {
    server_info: Implementation,
    instructions: Option<String>,
    tools: Vec<ToolEntry>,
    resources: Vec<ResourceEntry>,
    templates: Vec<TemplateEntry>,
    prompts: Vec<PromptEntry>,
}

impl CapabilityRegistry {
    /// Create an empty registry for the given server identity.
    pub fn new(server_info: Implementation) -> Self {
        Self {
            server_info,
            instructions: None,
            tools: Vec::new(),
            resources: Vec::new(),
            templates: Vec::new(),
            prompts: Vec::new(),
        }
    }

    /// The registry with all built-in calculator capabilities.
    pub fn builtin() -> Result<Self, UriTemplateError> {
        builtin::register_all(Self::new(builtin::server_info()))
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn with_tool(mut self, definition: Tool, handler: impl ToolHandler + 'static) -> Self {
        self.tools.retain(|t| t.definition.name != definition.name);
        self.tools.push(ToolEntry {
            definition,
            handler: Arc::new(handler),
        });
        self
    }

    /// Register a resource with a fixed URI.
    pub fn with_resource(mut self, resource: Resource, reader: impl ResourceReader + 'static) -> Self {
        self.resources.retain(|r| r.resource.uri != resource.uri);
        self.resources.push(ResourceEntry {
            resource,
            reader: Arc::new(reader),
        });
        self
    }

    /// Register a templated resource such as `greeting://{name}`.
    pub fn with_resource_template(
        mut self,
        template: ResourceTemplate,
        reader: impl ResourceReader + 'static,
    ) -> Result<Self, UriTemplateError> {
        let matcher = UriTemplate::parse(&template.uri_template)?;
        self.templates.retain(|t| t.template.name != template.name);
        self.templates.push(TemplateEntry {
            template,
            matcher,
            reader: Arc::new(reader),
        });
        Ok(self)
    }

    /// Register a prompt template. A prompt with the same name is replaced.
    pub fn with_prompt(mut self, prompt: Prompt, renderer: impl PromptRenderer + 'static) -> Self {
        self.prompts.retain(|p| p.prompt.name != prompt.name);
        self.prompts.push(PromptEntry {
            prompt,
            renderer: Arc::new(renderer),
        });
        self
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty() || !self.templates.is_empty()
    }

    pub fn has_prompts(&self) -> bool {
        !self.prompts.is_empty()
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Invoke a tool by name.
    pub fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<CallToolResult, CapabilityError> {
        let entry = self
            .tools
            .iter()
            .find(|t| t.definition.name == name)
            .ok_or_else(|| CapabilityError::UnknownTool(name.to_string()))?;
        debug!("Calling tool {}", name);
        entry.handler.call(arguments)
    }

    pub fn list_resources(&self) -> Vec<Resource> {
        self.resources.iter().map(|r| r.resource.clone()).collect()
    }

    pub fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.templates.iter().map(|t| t.template.clone()).collect()
    }

    /// Read a resource. Fixed URIs take precedence over templates.
    pub fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, CapabilityError> {
        if let Some(entry) = self.resources.iter().find(|r| r.resource.uri == uri) {
            return entry.reader.read(uri, &HashMap::new());
        }

        for entry in &self.templates {
            if let Some(variables) = entry.matcher.matches(uri) {
                debug!(
                    "Resource {} matched template {}",
                    uri,
                    entry.matcher.as_str()
                );
                return entry.reader.read(uri, &variables);
            }
        }

        Err(CapabilityError::ResourceNotFound(uri.to_string()))
    }

    pub fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.iter().map(|p| p.prompt.clone()).collect()
    }

    /// Render a prompt after checking that every required argument is present.
    pub fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<GetPromptResult, CapabilityError> {
        let entry = self
            .prompts
            .iter()
            .find(|p| p.prompt.name == name)
            .ok_or_else(|| CapabilityError::UnknownPrompt(name.to_string()))?;

        if let Some(missing) = entry
            .prompt
            .arguments
            .iter()
            .find(|arg| arg.required && !arguments.contains_key(&arg.name))
        {
            return Err(CapabilityError::InvalidArguments {
                name: name.to_string(),
                reason: format!("missing required argument '{}'", missing.name),
            });
        }

        entry.renderer.render(arguments)
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("server_info", &self.server_info)
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .field("templates", &self.templates.len())
            .field("prompts", &self.prompts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_listing() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let tools: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(tools, vec!["add", "subtract", "multiply", "divide"]);

        let resources = registry.list_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "time://current");

        let templates = registry.list_resource_templates();
        assert_eq!(templates[0].uri_template, "greeting://{name}");

        assert_eq!(registry.list_prompts()[0].name, "math-problem");
        assert_eq!(registry.server_info().name, "Demo");
    }

    #[test]
    fn test_call_unknown_tool() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let err = registry.call_tool("sqrt", &Map::new()).unwrap_err();
        assert_eq!(err, CapabilityError::UnknownTool("sqrt".to_string()));
    }

    #[test]
    fn test_call_tool_dispatches() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let result = registry
            .call_tool("multiply", &args(json!({"a": 6, "b": 7})))
            .unwrap();
        assert_eq!(result.content[0].as_text(), Some("42"));
    }

    #[test]
    fn test_read_resource_static_and_template() {
        let registry = CapabilityRegistry::builtin().unwrap();

        let greeting = registry.read_resource("greeting://World").unwrap();
        assert_eq!(greeting.contents[0].text, "Hello, World!");
        assert_eq!(greeting.contents[0].uri, "greeting://World");

        let time = registry.read_resource("time://current").unwrap();
        assert!(time.contents[0].text.starts_with("Current time: "));

        assert_eq!(
            registry.read_resource("nope://x").unwrap_err(),
            CapabilityError::ResourceNotFound("nope://x".to_string())
        );
    }

    #[test]
    fn test_get_prompt_requires_arguments() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let err = registry
            .get_prompt("math-problem", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArguments { .. }));

        let err = registry.get_prompt("poem", &HashMap::new()).unwrap_err();
        assert_eq!(err, CapabilityError::UnknownPrompt("poem".to_string()));
    }

    #[test]
    fn test_registration_replaces_same_name() {
        struct Constant;
        impl ToolHandler for Constant {
            fn call(&self, _: &Map<String, Value>) -> Result<CallToolResult, CapabilityError> {
                Ok(CallToolResult::success(vec![abacus_types::Content::text("1")]))
            }
        }

        let tool = Tool {
            name: "one".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
        };
        let registry = CapabilityRegistry::new(Implementation::new("t", "0"))
            .with_tool(tool.clone(), Constant)
            .with_tool(tool, Constant);
        assert_eq!(registry.list_tools().len(), 1);
        assert!(registry.has_tools());
        assert!(!registry.has_prompts());
        assert!(!registry.has_resources());
    }
}
