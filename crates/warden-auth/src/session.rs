//! In-memory session storage
//!
//! Sessions live in process memory, keyed by a random id the client keeps in a
//! cookie. Suitable for a single process; other backends implement
//! [`SessionBackend`] against their own storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::{OpenedSession, SessionBackend, SessionStore};
use crate::{AuthError, AuthResult};

type Values = Arc<RwLock<HashMap<String, String>>>;

/// Values of one session
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    values: Values,
}

impl MemorySession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Whether the session holds no values
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> AuthResult<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: MemorySession,
    expires_at: DateTime<Utc>,
}

/// Process-local session backend with sliding expiry
#[derive(Debug, Clone)]
pub struct MemorySessionBackend {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl MemorySessionBackend {
    /// Create a backend whose sessions expire after `ttl_seconds` of inactivity
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: i64::try_from(ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop a session entirely
    pub async fn destroy(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Remove expired sessions, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        before - sessions.len()
    }
}

impl Default for MemorySessionBackend {
    fn default() -> Self {
        Self::new(24 * 60 * 60)
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn open(&self, id: Option<&str>) -> AuthResult<OpenedSession> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::session_error("session expiry is out of range"))?;
        let mut sessions = self.sessions.write().await;

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(id) {
                if entry.expires_at > now {
                    entry.expires_at = expires_at;
                    return Ok(OpenedSession {
                        id: id.to_string(),
                        store: Arc::new(entry.session.clone()),
                        created: false,
                    });
                }
                tracing::debug!(session_id = %id, "session expired");
                sessions.remove(id);
            }
        }

        sessions.retain(|_, entry| entry.expires_at > now);

        let id = Uuid::new_v4().simple().to_string();
        let session = MemorySession::new();
        sessions.insert(
            id.clone(),
            SessionEntry {
                session: session.clone(),
                expires_at,
            },
        );

        Ok(OpenedSession {
            id,
            store: Arc::new(session),
            created: true,
        })
    }
}
