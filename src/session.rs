//! Cookie-backed web sessions.
//!
//! Each logged-in browser holds one [`WebSession`]: the user's identity and
//! a shared [`ChatSession`] behind an async mutex. The mutex doubles as the
//! one-stream-in-flight guard: the streaming handler holds it for the whole
//! turn, so a concurrent submission observes it locked and is rejected.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::ClientConfig;
use crate::chat::ChatSession;

/// Sessions idle longer than this are eligible for cleanup.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Identity established by a successful credential exchange.
#[derive(Clone)]
pub struct AuthUser {
    /// Opaque bearer token forwarded on every API call.
    pub token: String,
    pub email: String,
    pub user_id: i64,
}

impl std::fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthUser")
            .field("email", &self.email)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct WebSessionInner {
    id: String,
    user: AuthUser,
    chat: Arc<Mutex<ChatSession>>,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
}

/// One browser's server-side state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WebSession {
    inner: Arc<WebSessionInner>,
}

impl WebSession {
    fn new(user: AuthUser, base_url: &str) -> Self {
        let config = ClientConfig {
            base_url: base_url.to_string(),
            bearer_token: Some(user.token.clone()),
            user_id: user.user_id.to_string(),
        };
        let now = Utc::now();
        Self {
            inner: Arc::new(WebSessionInner {
                id: Uuid::new_v4().to_string(),
                user,
                chat: Arc::new(Mutex::new(ChatSession::new(config))),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn user(&self) -> &AuthUser {
        &self.inner.user
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Handle to the session's chat state. Lock it to read or drive a turn.
    #[must_use]
    pub fn chat(&self) -> Arc<Mutex<ChatSession>> {
        Arc::clone(&self.inner.chat)
    }

    /// Record activity, deferring expiry.
    pub fn touch(&self) {
        *self.inner.last_activity.write().unwrap() = Utc::now();
    }

    #[must_use]
    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        let last = *self.inner.last_activity.read().unwrap();
        let idle = Utc::now().signed_duration_since(last);
        idle.to_std().is_ok_and(|idle| idle > idle_timeout)
    }
}

/// Shared registry of live web sessions, keyed by cookie value.
#[derive(Debug, Clone, Default)]
pub struct WebSessionStore {
    sessions: Arc<RwLock<HashMap<String, WebSession>>>,
}

impl WebSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a freshly authenticated user.
    pub fn create(&self, user: AuthUser, api_base_url: &str) -> WebSession {
        let session = WebSession::new(user, api_base_url);
        info!(session_id = %session.id(), email = %session.user().email, "web session created");
        self.sessions
            .write()
            .unwrap()
            .insert(session.id().to_string(), session.clone());
        session
    }

    /// Look up a session by cookie value, marking it active.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<WebSession> {
        let session = self.sessions.read().unwrap().get(id).cloned();
        if let Some(session) = &session {
            session.touch();
        }
        session
    }

    /// Drop a session, e.g. on logout.
    pub fn remove(&self, id: &str) -> Option<WebSession> {
        let removed = self.sessions.write().unwrap().remove(id);
        if removed.is_some() {
            info!(session_id = %id, "web session removed");
        }
        removed
    }

    /// Evict sessions idle past `idle_timeout`; returns how many went.
    pub fn cleanup_expired(&self, idle_timeout: Duration) -> usize {
        let mut sessions = self.sessions.write().unwrap();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(idle_timeout));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "expired web sessions evicted");
        }
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> AuthUser {
        AuthUser {
            token: "tok-123".to_string(),
            email: "trader@example.com".to_string(),
            user_id: 7,
        }
    }

    #[test]
    fn test_store_create_get_remove() {
        let store = WebSessionStore::new();
        assert!(store.is_empty());

        let session = store.create(test_user(), "http://127.0.0.1:8080");
        assert_eq!(store.len(), 1);

        let found = store.get(session.id()).expect("session resolvable");
        assert_eq!(found.user().email, "trader@example.com");

        assert!(store.remove(session.id()).is_some());
        assert!(store.get(session.id()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_fresh_session_is_not_expired() {
        let store = WebSessionStore::new();
        let session = store.create(test_user(), "http://127.0.0.1:8080");
        assert!(!session.is_expired(DEFAULT_IDLE_TIMEOUT));
        assert_eq!(store.cleanup_expired(DEFAULT_IDLE_TIMEOUT), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cleanup_evicts_idle_sessions() {
        let store = WebSessionStore::new();
        let session = store.create(test_user(), "http://127.0.0.1:8080");
        // A zero timeout makes any session idle.
        assert!(session.is_expired(Duration::ZERO));
        assert_eq!(store.cleanup_expired(Duration::ZERO), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", test_user());
        assert!(!rendered.contains("tok-123"));
        assert!(rendered.contains("trader@example.com"));
    }

    #[test]
    fn test_chat_handle_is_shared() {
        let store = WebSessionStore::new();
        let session = store.create(test_user(), "http://127.0.0.1:8080");
        let a = session.chat();
        let b = store.get(session.id()).unwrap().chat();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
