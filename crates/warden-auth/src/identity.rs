//! Session-to-user resolution
//!
//! The resolver reads `user_id` from the session and looks the user up through
//! the [`UserRepository`]. A missing id, a failed lookup or an unknown user all
//! resolve to [`Identity::Anonymous`]; an id pointing at no user is also
//! removed from the session so the next request starts clean.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::traits::{Authenticatable, SessionStore, UserRepository, CSRF_TOKEN_KEY, USER_ID_KEY};
use crate::AuthResult;

/// Outcome of resolving a session
#[derive(Debug, Clone, PartialEq)]
pub enum Identity<U> {
    /// No authenticated user
    Anonymous,
    /// Session belongs to this user
    User(U),
}

impl<U: Authenticatable> Identity<U> {
    /// The resolved user, if any
    pub fn user(&self) -> Option<&U> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    /// Whether the request is unauthenticated
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    /// Roles of the identity; anonymous has none
    pub fn roles(&self) -> Vec<String> {
        self.user().map(Authenticatable::roles).unwrap_or_default()
    }
}

/// Request-scoped memo of the resolved identity
///
/// Create one per request; the first resolution is stored and later calls
/// return it without touching the session or the repository again.
#[derive(Debug)]
pub struct IdentityCache<U> {
    cell: OnceCell<Identity<U>>,
}

impl<U> IdentityCache<U> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The memoized identity, if resolution already ran
    pub fn get(&self) -> Option<&Identity<U>> {
        self.cell.get()
    }
}

impl<U> Default for IdentityCache<U> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves sessions to users and manages login state
pub struct IdentityResolver<R: UserRepository> {
    repository: Arc<R>,
}

impl<R: UserRepository> Clone for IdentityResolver<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: UserRepository> IdentityResolver<R> {
    /// Create a resolver over a user repository
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// The underlying repository
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Resolve the session, memoized in `cache` for the rest of the request
    pub async fn resolve<'c>(
        &self,
        session: &dyn SessionStore,
        cache: &'c IdentityCache<R::User>,
    ) -> &'c Identity<R::User> {
        cache.cell.get_or_init(|| self.load(session)).await
    }

    async fn load(&self, session: &dyn SessionStore) -> Identity<R::User> {
        let user_id = match session.get(USER_ID_KEY).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return Identity::Anonymous,
            Err(err) => {
                warn!(error = %err, "could not read session, treating request as anonymous");
                return Identity::Anonymous;
            }
        };

        match self.repository.find_by_id(&user_id).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id(), "session resolved");
                Identity::User(user)
            }
            Ok(None) => {
                warn!(user_id = %user_id, "session refers to unknown user, clearing it");
                if let Err(err) = session.delete(USER_ID_KEY).await {
                    warn!(error = %err, "could not clear stale session user");
                }
                Identity::Anonymous
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "user lookup failed, treating request as anonymous");
                Identity::Anonymous
            }
        }
    }

    /// Bind the session to a user
    pub async fn login(&self, session: &dyn SessionStore, user: &R::User) -> AuthResult<()> {
        session.set(USER_ID_KEY, user.id().to_string()).await?;
        debug!(user_id = %user.id(), "user logged in");
        Ok(())
    }

    /// Clear the session's user and its CSRF token
    pub async fn logout(&self, session: &dyn SessionStore) -> AuthResult<()> {
        session.delete(USER_ID_KEY).await?;
        session.delete(CSRF_TOKEN_KEY).await?;
        debug!("user logged out");
        Ok(())
    }
}
