//! Abacus backend library.
//!
//! An MCP calculator server. Each client session gets its own protocol engine,
//! multiplexed over one Streamable HTTP endpoint. This module exposes the
//! application builder for use by the binaries and integration tests.

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod capabilities;
pub mod config;
pub mod logging;
pub mod mcp;
pub mod state;

use abacus_types::MCP_SESSION_ID_HEADER;
use state::AppState;

/// Create the Axum application router with default state.
pub fn create_app() -> Router {
    create_app_with_state(AppState::default())
}

/// Create the Axum application router with a given state.
///
/// The MCP endpoint is mounted on [`AppState::endpoint_path`].
pub fn create_app_with_state(state: AppState) -> Router {
    let cors = {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                HeaderName::from_static(MCP_SESSION_ID_HEADER),
            ])
            .expose_headers([HeaderName::from_static(MCP_SESSION_ID_HEADER)]);

        // If no origins specified, allow any origin
        // Otherwise, restrict to the specified origins
        if state.allowed_origins().is_empty() {
            cors.allow_origin(Any)
        } else {
            let origins: Vec<HeaderValue> = state
                .allowed_origins()
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect();
            cors.allow_origin(origins)
        }
    };

    let endpoint_path = state.endpoint_path().to_string();

    Router::new()
        .route("/", get(api::index::index))
        .route("/health", get(api::index::health))
        .route(
            &endpoint_path,
            get(api::mcp::mcp_get)
                .post(api::mcp::mcp_post)
                .delete(api::mcp::mcp_delete),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
