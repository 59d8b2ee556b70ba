//! Landing page and health check.

use axum::{extract::State, response::Html};
use std::fmt::Write;

use crate::capabilities::CapabilityRegistry;
use crate::state::AppState;

/// GET / - Describe the server and how to connect to it.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(state.capabilities(), state.endpoint_path()))
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

fn render_index(capabilities: &CapabilityRegistry, endpoint_path: &str) -> String {
    let mut tools = String::new();
    for tool in capabilities.list_tools() {
        let _ = writeln!(
            tools,
            "          <li><code>{}</code>: {}</li>",
            escape(&tool.name),
            escape(tool.description.as_deref().unwrap_or(""))
        );
    }

    let mut resources = String::new();
    for template in capabilities.list_resource_templates() {
        let _ = writeln!(
            resources,
            "          <li><code>{}</code>: {}</li>",
            escape(&template.uri_template),
            escape(&template.name)
        );
    }
    for resource in capabilities.list_resources() {
        let _ = writeln!(
            resources,
            "          <li><code>{}</code>: {}</li>",
            escape(&resource.uri),
            escape(&resource.name)
        );
    }

    let mut prompts = String::new();
    for prompt in capabilities.list_prompts() {
        let _ = writeln!(
            prompts,
            "          <li><code>{}</code>: {}</li>",
            escape(&prompt.name),
            escape(prompt.description.as_deref().unwrap_or(""))
        );
    }

    let info = capabilities.server_info();
    let path = escape(endpoint_path);
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>{name} MCP Server</title>
    <style>
      body {{ font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }}
      code {{ background: #f4f4f4; padding: 2px 5px; border-radius: 3px; }}
    </style>
  </head>
  <body>
    <h1>MCP Server Running</h1>
    <p>{name} {version} implements the Model Context Protocol and is accessible at <code>{path}</code>.</p>
    <h2>Available Features</h2>
    <h3>Tools</h3>
    <ul>
{tools}    </ul>
    <h3>Resources</h3>
    <ul>
{resources}    </ul>
    <h3>Prompts</h3>
    <ul>
{prompts}    </ul>
    <h2>How to Connect</h2>
    <p>Point an MCP client using the Streamable HTTP transport at <code>{path}</code> on this host.</p>
  </body>
</html>
"#,
        name = escape(&info.name),
        version = escape(&info.version),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
