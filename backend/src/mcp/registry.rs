//! Transport registry.
//!
//! Maps session IDs to their [`SessionTransport`]. This is the single source of truth
//! for which sessions exist: a session is reachable from the outside exactly while it
//! is registered here.

use crate::mcp::transport::{SessionState, SessionTransport};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session {0} is already registered")]
    DuplicateSession(String),

    #[error("Session {0} not found")]
    NotFound(String),

    #[error("Registry is closed, server is shutting down")]
    RegistryClosed,

    #[error("Invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// Registry of live sessions, shared by every request handler.
///
/// Every operation takes the map lock for its whole duration, so a lookup never
/// observes a session half-registered or half-removed.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    inner: Arc<RwLock<Sessions>>,
}

#[derive(Default)]
struct Sessions {
    map: HashMap<String, Arc<SessionTransport>>,
    /// Set by `close_all`; no registrations are accepted afterwards.
    closed: bool,
}

impl TransportRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under its session ID.
    pub async fn register(
        &self,
        id: String,
        transport: Arc<SessionTransport>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.inner.write().await;
        if sessions.closed {
            return Err(SessionError::RegistryClosed);
        }
        match sessions.map.entry(id) {
            Entry::Occupied(entry) => Err(SessionError::DuplicateSession(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!("Registered MCP session: {}", entry.key());
                entry.insert(transport);
                Ok(())
            }
        }
    }

    /// Look up the transport for a session ID.
    pub async fn lookup(&self, id: &str) -> Result<Arc<SessionTransport>, SessionError> {
        let sessions = self.inner.read().await;
        sessions
            .map
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Remove a session. Removing an unknown ID is a no-op.
    ///
    /// Returns whether a session was removed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut sessions = self.inner.write().await;
        let removed = sessions.map.remove(id).is_some();
        if removed {
            debug!("Removed MCP session: {}", id);
        }
        removed
    }

    /// Remove `id` only if it is still bound to `transport`.
    ///
    /// Used by a closing transport so that it can never evict a different
    /// transport registered under the same ID.
    pub(crate) async fn deregister(&self, id: &str, transport: &SessionTransport) -> bool {
        let mut sessions = self.inner.write().await;
        match sessions.map.get(id) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), transport) => {
                sessions.map.remove(id);
                debug!("Deregistered MCP session: {}", id);
                true
            }
            _ => false,
        }
    }

    /// Check if a session exists.
    pub async fn contains(&self, id: &str) -> bool {
        let sessions = self.inner.read().await;
        sessions.map.contains_key(id)
    }

    /// Get the number of active sessions.
    pub async fn len(&self) -> usize {
        let sessions = self.inner.read().await;
        sessions.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every session. Called once at server shutdown.
    ///
    /// The map is drained under the lock and the transports are closed after
    /// releasing it, since closing a transport deregisters it. The registry stays
    /// closed, so a handshake finishing after the drain cannot register.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<SessionTransport>> = {
            let mut sessions = self.inner.write().await;
            sessions.closed = true;
            sessions.map.drain().map(|(_, transport)| transport).collect()
        };

        for transport in &drained {
            transport.close().await;
        }

        if !drained.is_empty() {
            info!("Closed {} MCP session(s)", drained.len());
        }
        drained.len()
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use crate::mcp::transport::SessionConfig;

    fn transport(registry: &TransportRegistry) -> Arc<SessionTransport> {
        SessionTransport::new(
            registry.clone(),
            Arc::new(CapabilityRegistry::builtin().unwrap()),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = TransportRegistry::new();
        let t = transport(&registry);

        registry.register("s1".to_string(), t.clone()).await.unwrap();
        let found = registry.lookup("s1").await.unwrap();
        assert!(Arc::ptr_eq(&found, &t));
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains("s1").await);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = TransportRegistry::new();
        let first = transport(&registry);
        let second = transport(&registry);

        registry.register("s1".to_string(), first.clone()).await.unwrap();
        let err = registry
            .register("s1".to_string(), second)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::DuplicateSession("s1".to_string()));

        // The original binding is untouched
        let found = registry.lookup("s1").await.unwrap();
        assert!(Arc::ptr_eq(&found, &first));
    }

    #[tokio::test]
    async fn test_lookup_unknown() {
        let registry = TransportRegistry::new();
        assert_eq!(
            registry.lookup("missing").await.unwrap_err(),
            SessionError::NotFound("missing".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = TransportRegistry::new();
        registry
            .register("s1".to_string(), transport(&registry))
            .await
            .unwrap();

        assert!(registry.remove("s1").await);
        assert!(!registry.remove("s1").await);
        assert!(!registry.remove("never-existed").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_deregister_only_removes_same_transport() {
        let registry = TransportRegistry::new();
        let registered = transport(&registry);
        let other = transport(&registry);
        registry
            .register("s1".to_string(), registered.clone())
            .await
            .unwrap();

        assert!(!registry.deregister("s1", &other).await);
        assert!(registry.contains("s1").await);
        assert!(registry.deregister("s1", &registered).await);
        assert!(!registry.contains("s1").await);
    }

    #[tokio::test]
    async fn test_close_all_drains_and_closes() {
        let registry = TransportRegistry::new();
        let t1 = transport(&registry);
        let t2 = transport(&registry);
        let id1 = t1.activate().unwrap();
        let id2 = t2.activate().unwrap();
        registry.register(id1, t1.clone()).await.unwrap();
        registry.register(id2, t2.clone()).await.unwrap();

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty().await);
        assert_eq!(t1.state(), SessionState::Closed);
        assert_eq!(t2.state(), SessionState::Closed);
        assert_eq!(registry.close_all().await, 0);
    }

    #[tokio::test]
    async fn test_register_after_close_all_rejected() {
        let registry = TransportRegistry::new();
        registry.close_all().await;

        let late = transport(&registry);
        let id = late.activate().unwrap();
        assert_eq!(
            registry.register(id.clone(), late).await.unwrap_err(),
            SessionError::RegistryClosed
        );
        assert!(!registry.contains(&id).await);
    }
}
