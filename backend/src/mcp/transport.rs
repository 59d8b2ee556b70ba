//! Session transport.
//!
//! A [`SessionTransport`] binds one [`McpEngine`] to one Streamable HTTP session and
//! turns individual HTTP exchanges into engine messages:
//!
//! - `POST` bodies are inbound messages; the paired response carries the replies.
//! - `GET` holds an SSE stream open for server-initiated notifications.
//! - `DELETE` tears the session down.
//!
//! Lifecycle is `Pending → Active → Closed`. A transport becomes `Active` when the
//! engine completes the `initialize` handshake; that is the moment its session ID is
//! generated and registered. Every exit path converges on [`SessionTransport::close`].

use crate::capabilities::CapabilityRegistry;
use crate::mcp::engine::McpEngine;
use crate::mcp::registry::{SessionError, TransportRegistry};
use abacus_types::{
    error_codes, JsonRpcMessage, JsonRpcNotification, JsonRpcResponse, MCP_SESSION_ID_HEADER,
};
use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{future, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created for an `initialize` request, no session ID yet.
    Pending,
    /// Session ID assigned and registered.
    Active,
    /// Torn down and no longer addressable.
    Closed,
}

/// Per-session transport settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Answer POSTs with `application/json` even when the client accepts SSE.
    pub json_response: bool,
    /// Capacity of the outbound notification channel.
    pub event_buffer: usize,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
    /// Source of session IDs, called once per successful handshake.
    pub id_generator: fn() -> String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            json_response: true,
            event_buffer: 100,
            keep_alive: Duration::from_secs(15),
            id_generator: new_session_id,
        }
    }
}

/// A random UUID v4.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

struct Lifecycle {
    state: SessionState,
    session_id: Option<String>,
}

/// One logical client session.
pub struct SessionTransport {
    registry: TransportRegistry,
    config: SessionConfig,
    /// POSTs of one session are serialized through the engine.
    engine: tokio::sync::Mutex<McpEngine>,
    lifecycle: Mutex<Lifecycle>,
    /// Serialized server-initiated messages for the GET stream.
    outbound: broadcast::Sender<String>,
    stream_attached: AtomicBool,
    cancel: CancellationToken,
}

impl SessionTransport {
    /// Create a `Pending` transport with a fresh engine.
    pub fn new(
        registry: TransportRegistry,
        capabilities: Arc<CapabilityRegistry>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let (outbound, _) = broadcast::channel(config.event_buffer.max(1));
        Arc::new(Self {
            registry,
            engine: tokio::sync::Mutex::new(McpEngine::new(capabilities)),
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Pending,
                session_id: None,
            }),
            outbound,
            stream_attached: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            config,
        })
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    pub fn session_id(&self) -> Option<String> {
        self.lifecycle.lock().session_id.clone()
    }

    /// Whether a GET stream is currently attached.
    pub fn has_stream(&self) -> bool {
        self.stream_attached.load(Ordering::Acquire)
    }

    /// Token fired when the session closes.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// `Pending → Active`: assign a freshly generated session ID.
    pub fn activate(&self) -> Result<String, SessionError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != SessionState::Pending {
            return Err(SessionError::InvalidTransition {
                from: lifecycle.state,
                to: SessionState::Active,
            });
        }
        let id = (self.config.id_generator)();
        lifecycle.state = SessionState::Active;
        lifecycle.session_id = Some(id.clone());
        Ok(id)
    }

    /// Queue a server-initiated message for the GET stream.
    ///
    /// Returns false when no stream is attached and the message was dropped.
    pub fn notify(&self, notification: &JsonRpcNotification) -> bool {
        let json = match serde_json::to_string(notification) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize MCP notification: {}", e);
                return false;
            }
        };
        match self.outbound.send(json) {
            Ok(_) => true,
            Err(_) => {
                debug!(
                    "MCP: No stream attached, dropping {} notification",
                    notification.method
                );
                false
            }
        }
    }

    /// Handle a POST carrying one JSON-RPC message or a batch.
    pub async fn handle_post(self: &Arc<Self>, headers: &HeaderMap, body: Value) -> Response {
        let (messages, is_batch) = match JsonRpcMessage::parse_payload(body) {
            Ok(parsed) => parsed,
            Err(error) => {
                return jsonrpc_error(StatusCode::BAD_REQUEST, error.code, &error.message);
            }
        };

        let has_initialize = messages.iter().any(JsonRpcMessage::is_initialize);
        match self.state() {
            SessionState::Closed => return session_not_found(),
            SessionState::Active if has_initialize => {
                return jsonrpc_error(
                    StatusCode::BAD_REQUEST,
                    error_codes::INVALID_REQUEST,
                    "Invalid Request: Server already initialized",
                );
            }
            SessionState::Pending if !has_initialize => {
                return jsonrpc_error(
                    StatusCode::BAD_REQUEST,
                    error_codes::SERVER_ERROR,
                    "Bad Request: Server not initialized",
                );
            }
            _ => {}
        }
        if has_initialize && messages.len() > 1 {
            return jsonrpc_error(
                StatusCode::BAD_REQUEST,
                error_codes::INVALID_REQUEST,
                "Invalid Request: Only one initialization request is allowed",
            );
        }

        let mut engine = self.engine.lock().await;
        if self.state() == SessionState::Closed {
            return session_not_found();
        }

        let mut responses = Vec::new();
        for message in messages {
            let dispatch = engine.handle(message);
            for notification in &dispatch.notifications {
                self.notify(notification);
            }
            if dispatch.handshake_completed {
                if let Err(response) = self.complete_handshake().await {
                    return response;
                }
            }
            responses.extend(dispatch.response);
        }
        drop(engine);

        let session_id = self.session_id();

        if responses.is_empty() {
            return with_session_header(StatusCode::ACCEPTED.into_response(), session_id);
        }

        let response = if self.config.json_response || !accepts_event_stream(headers) {
            match responses.as_slice() {
                [single] if !is_batch => Json(single).into_response(),
                all => Json(all).into_response(),
            }
        } else {
            let events: Vec<Result<Event, Infallible>> = responses
                .iter()
                .filter_map(|response| serde_json::to_string(response).ok())
                .map(|json| Ok(Event::default().event("message").data(json)))
                .collect();
            Sse::new(futures::stream::iter(events)).into_response()
        };

        with_session_header(response, session_id)
    }

    /// Register the session once the engine has accepted `initialize`.
    async fn complete_handshake(self: &Arc<Self>) -> Result<String, Response> {
        let id = self.activate().map_err(|e| {
            warn!("MCP: {}", e);
            jsonrpc_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                &e.to_string(),
            )
        })?;

        match self.registry.register(id.clone(), Arc::clone(self)).await {
            Ok(()) => {
                info!("MCP: New session initialized: {}", id);
                Ok(id)
            }
            Err(e) => {
                warn!("MCP: Rejecting initialization: {}", e);
                self.close().await;
                let (status, message) = match e {
                    SessionError::RegistryClosed => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Service Unavailable: Server is shutting down",
                    ),
                    _ => (StatusCode::CONFLICT, "Conflict: Session already exists"),
                };
                Err(jsonrpc_error(status, error_codes::SERVER_ERROR, message))
            }
        }
    }

    /// Handle a GET: attach the session's outbound SSE stream.
    ///
    /// The stream ends when the session closes. Only one stream may be attached at a
    /// time; the slot is released whenever the stream is dropped. A stream dropped
    /// while the session is still open means the client went away, and the session
    /// is torn down.
    pub fn handle_get(self: &Arc<Self>, headers: &HeaderMap) -> Response {
        if self.state() != SessionState::Active {
            return session_not_found();
        }
        if !accepts_event_stream(headers) {
            return jsonrpc_error(
                StatusCode::NOT_ACCEPTABLE,
                error_codes::SERVER_ERROR,
                "Not Acceptable: Client must accept text/event-stream",
            );
        }
        if self
            .stream_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return jsonrpc_error(
                StatusCode::CONFLICT,
                error_codes::SERVER_ERROR,
                "Conflict: Only one SSE stream is allowed per session",
            );
        }

        let receiver = self.outbound.subscribe();
        let slot = StreamSlot {
            transport: Arc::clone(self),
        };
        let session_id = self.session_id();
        info!(
            "MCP: SSE stream opened for session {}",
            session_id.as_deref().unwrap_or("-")
        );

        let stream = BroadcastStream::new(receiver)
            .filter_map(|item| {
                future::ready(match item {
                    Ok(json) => Some(Ok::<_, Infallible>(
                        Event::default().event("message").data(json),
                    )),
                    Err(e) => {
                        // Lagged receivers skip ahead
                        warn!("MCP: SSE client lagging, skipping events: {}", e);
                        None
                    }
                })
            })
            .take_until(self.cancel.clone().cancelled_owned())
            .map(move |event| {
                let _slot = &slot;
                event
            });

        let response = Sse::new(stream)
            .keep_alive(KeepAlive::new().interval(self.config.keep_alive))
            .into_response();
        with_session_header(response, session_id)
    }

    /// Handle a DELETE: terminate the session.
    pub async fn handle_delete(&self) -> Response {
        let session_id = self.session_id();
        self.close().await;
        with_session_header(StatusCode::OK.into_response(), session_id)
    }

    /// Tear the session down. Idempotent.
    ///
    /// Marks the transport `Closed`, ends any attached stream and removes the session
    /// from the registry.
    pub async fn close(&self) {
        if let Some(session_id) = self.mark_closed() {
            self.deregister(session_id).await;
        }
    }

    /// Move to `Closed` and fire the cancellation token.
    ///
    /// Returns `None` if the transport was already closed, otherwise the session ID
    /// (if one was ever assigned) that still has to be deregistered.
    fn mark_closed(&self) -> Option<Option<String>> {
        let session_id = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == SessionState::Closed {
                return None;
            }
            lifecycle.state = SessionState::Closed;
            lifecycle.session_id.clone()
        };
        self.cancel.cancel();
        Some(session_id)
    }

    async fn deregister(&self, session_id: Option<String>) {
        if let Some(id) = session_id {
            self.registry.deregister(&id, self).await;
            info!("MCP: Session terminated: {}", id);
        }
    }
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self.lifecycle.lock();
        f.debug_struct("SessionTransport")
            .field("state", &lifecycle.state)
            .field("session_id", &lifecycle.session_id)
            .field("stream_attached", &self.has_stream())
            .finish()
    }
}

/// Occupies the single GET stream slot of a session until dropped.
struct StreamSlot {
    transport: Arc<SessionTransport>,
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        self.transport
            .stream_attached
            .store(false, Ordering::Release);
        debug!(
            "MCP: SSE stream released for session {}",
            self.transport.session_id().as_deref().unwrap_or("-")
        );

        // Dropped before the session closed: the client disconnected
        let Some(session_id) = self.transport.mark_closed() else {
            return;
        };
        info!(
            "MCP: SSE client disconnected, closing session {}",
            session_id.as_deref().unwrap_or("-")
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = Arc::clone(&self.transport);
                handle.spawn(async move { transport.deregister(session_id).await });
            }
            Err(_) => warn!("MCP: No runtime to deregister disconnected session"),
        }
    }
}

/// A JSON-RPC error response with a `null` id.
pub fn jsonrpc_error(status: StatusCode, code: i32, message: &str) -> Response {
    (status, Json(JsonRpcResponse::error(Value::Null, code, message))).into_response()
}

fn session_not_found() -> Response {
    jsonrpc_error(
        StatusCode::NOT_FOUND,
        error_codes::SESSION_NOT_FOUND,
        "Session not found",
    )
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

fn with_session_header(mut response: Response, session_id: Option<String>) -> Response {
    if let Some(id) = session_id {
        if let Ok(value) = HeaderValue::from_str(&id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(MCP_SESSION_ID_HEADER), value);
        }
    }
    response
}
