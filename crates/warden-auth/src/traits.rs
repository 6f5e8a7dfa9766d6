//! Collaborator traits consumed by the core
//!
//! The core never owns users, sessions or mail delivery. Storage layers,
//! session transports and mailers plug in through these traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;

/// Session key holding the authenticated user's id
pub const USER_ID_KEY: &str = "user_id";

/// Session key holding the CSRF token
pub const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Capability interface for user entities
///
/// The core reads the id and role membership; everything else about the user
/// stays with the storage layer.
pub trait Authenticatable: Send + Sync + Clone + 'static {
    type Id: Clone + Send + Sync + std::fmt::Debug + std::fmt::Display + PartialEq;

    /// Get the user's unique identifier
    fn id(&self) -> &Self::Id;

    /// Get the user's role names
    fn roles(&self) -> Vec<String> {
        vec![]
    }

    /// Get the user's email address, if any
    fn email(&self) -> Option<&str> {
        None
    }

    /// Check if the user holds a role
    fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }
}

/// User lookup collaborator
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    type User: Authenticatable;

    /// Find a user by the id stored in the session
    async fn find_by_id(&self, id: &str) -> AuthResult<Option<Self::User>>;
}

/// Key-value view of the session attached to the current request
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: String) -> AuthResult<()>;

    /// Remove a value; removing a missing key is not an error
    async fn delete(&self, key: &str) -> AuthResult<()>;
}

/// A session opened for one request
#[derive(Clone)]
pub struct OpenedSession {
    /// Identifier to hand back to the client
    pub id: String,

    /// Store for the session's values
    pub store: Arc<dyn SessionStore>,

    /// Whether the session did not exist before this request
    pub created: bool,
}

impl std::fmt::Debug for OpenedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedSession")
            .field("id", &self.id)
            .field("created", &self.created)
            .finish()
    }
}

/// Session transport: maps a client-held identifier to a session store
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Open the session named by `id`, creating a fresh one when the id is
    /// missing, unknown or expired
    async fn open(&self, id: Option<&str>) -> AuthResult<OpenedSession>;
}

/// Outbound notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message to an address
    async fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()>;
}
