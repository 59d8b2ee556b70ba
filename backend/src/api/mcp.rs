//! MCP Streamable HTTP endpoint handlers.
//!
//! These handlers only resolve which [`SessionTransport`] a request belongs to.
//! The transport itself produces the HTTP response.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send JSON-RPC messages (returns JSON or SSE)
//! - `GET /mcp` - Open SSE stream for server-initiated messages
//! - `DELETE /mcp` - Terminate a session

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::mcp::transport::jsonrpc_error;
use crate::mcp::SessionTransport;
use crate::state::AppState;
use abacus_types::{error_codes, is_initialize_request, MCP_SESSION_ID_HEADER};

const LOCAL_ORIGINS: &[&str] = &[
    "http://localhost",
    "https://localhost",
    "http://127.0.0.1",
    "https://127.0.0.1",
    "http://[::1]",
    "https://[::1]",
];

/// Validate Origin header for DNS rebinding protection.
///
/// Requests without an Origin (non-browser clients) are accepted, as are localhost
/// origins on any port and the configured allow-list.
fn validate_origin(headers: &HeaderMap, allowed: &[String]) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Ok(origin) = origin.to_str() else {
        warn!("Rejecting MCP request with non-ASCII origin");
        return false;
    };

    let is_local = LOCAL_ORIGINS.iter().any(|prefix| {
        origin
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
    });
    if is_local || allowed.iter().any(|a| a == origin) {
        return true;
    }

    warn!("Rejecting MCP request from origin: {}", origin);
    false
}

/// Extract session ID from headers.
fn get_session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
}

/// True if the body is an `initialize` request, alone or inside a batch.
fn is_initialization(body: &Value) -> bool {
    match body {
        Value::Array(items) => items.iter().any(is_initialize_request),
        single => is_initialize_request(single),
    }
}

fn forbidden_origin() -> Response {
    jsonrpc_error(
        StatusCode::FORBIDDEN,
        error_codes::SERVER_ERROR,
        "Forbidden: Invalid origin",
    )
}

fn invalid_session() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid or missing session ID").into_response()
}

/// Resolve the transport of an existing session from the `mcp-session-id` header.
async fn resolve_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Option<Arc<SessionTransport>> {
    let session_id = get_session_id(headers)?;
    match state.registry().lookup(session_id).await {
        Ok(transport) => Some(transport),
        Err(e) => {
            debug!("MCP: {}", e);
            None
        }
    }
}

/// POST /mcp - Handle JSON-RPC messages.
///
/// Reuses the session named by `mcp-session-id`, or creates a new one when the
/// header is absent and the body is an `initialize` request.
pub async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !validate_origin(&headers, state.allowed_origins()) {
        return forbidden_origin();
    }

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            debug!("MCP: Unparseable POST body: {}", e);
            return jsonrpc_error(
                StatusCode::BAD_REQUEST,
                error_codes::PARSE_ERROR,
                "Parse error",
            );
        }
    };

    let session_id = get_session_id(&headers);
    debug!("MCP POST: session={:?}", session_id);

    let transport = match session_id {
        Some(_) => resolve_session(&state, &headers).await,
        None if is_initialization(&body) => Some(state.new_transport()),
        None => None,
    };

    match transport {
        Some(transport) => transport.handle_post(&headers, body).await,
        None => jsonrpc_error(
            StatusCode::BAD_REQUEST,
            error_codes::SERVER_ERROR,
            "Bad Request: No valid session ID provided",
        ),
    }
}

/// GET /mcp - Open SSE stream for server-initiated messages.
pub async fn mcp_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !validate_origin(&headers, state.allowed_origins()) {
        return forbidden_origin();
    }

    match resolve_session(&state, &headers).await {
        Some(transport) => transport.handle_get(&headers),
        None => invalid_session(),
    }
}

/// DELETE /mcp - Terminate session.
pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !validate_origin(&headers, state.allowed_origins()) {
        return forbidden_origin();
    }

    match resolve_session(&state, &headers).await {
        Some(transport) => transport.handle_delete().await,
        None => invalid_session(),
    }
}
