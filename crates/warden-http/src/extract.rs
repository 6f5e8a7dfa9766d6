//! Request extensions and extractors for handlers

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use warden_auth::{
    AuthResult, IdentityCache, ProtectionEngine, SessionStore, UserRepository,
};

use crate::error::HttpError;

/// The session attached to the current request
///
/// Inserted by [`crate::with_session`] and [`crate::protect`]. Identity is
/// resolved at most once per request: after a login or logout, the user seen
/// by [`AuthSession::current_user`] changes from the next request on.
pub struct AuthSession<R: UserRepository> {
    id: String,
    store: Arc<dyn SessionStore>,
    engine: Arc<ProtectionEngine<R>>,
    cache: Arc<IdentityCache<R::User>>,
}

impl<R: UserRepository> AuthSession<R> {
    pub(crate) fn new(id: String, store: Arc<dyn SessionStore>, engine: Arc<ProtectionEngine<R>>) -> Self {
        Self {
            id,
            store,
            engine,
            cache: Arc::new(IdentityCache::new()),
        }
    }

    /// Session identifier carried by the cookie
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw key-value access to the session
    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// The protection engine serving this request
    pub fn engine(&self) -> &ProtectionEngine<R> {
        &self.engine
    }

    pub(crate) fn cache(&self) -> &IdentityCache<R::User> {
        &self.cache
    }

    /// The signed-in user, if any
    pub async fn current_user(&self) -> Option<R::User> {
        self.engine
            .identity()
            .resolve(self.store.as_ref(), &self.cache)
            .await
            .user()
            .cloned()
    }

    /// Bind the session to a user
    pub async fn login(&self, user: &R::User) -> AuthResult<()> {
        self.engine.login(self.store.as_ref(), user).await
    }

    /// Sign the session out
    pub async fn logout(&self) -> AuthResult<()> {
        self.engine.logout(self.store.as_ref()).await
    }

    /// CSRF token for forms and scripts rendered in this session
    pub async fn csrf_token(&self) -> AuthResult<String> {
        self.engine.issue_csrf_token(self.store.as_ref()).await
    }
}

impl<R: UserRepository> Clone for AuthSession<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            store: self.store.clone(),
            engine: self.engine.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<R: UserRepository> std::fmt::Debug for AuthSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<R, S> FromRequestParts<S> for AuthSession<R>
where
    R: UserRepository,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSession<R>>()
            .cloned()
            .ok_or(HttpError::MissingSession)
    }
}

/// The user admitted by [`crate::protect`]
#[derive(Debug, Clone)]
pub struct CurrentUser<U>(pub U);

#[async_trait]
impl<U, S> FromRequestParts<S> for CurrentUser<U>
where
    U: Clone + Send + Sync + 'static,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser<U>>()
            .cloned()
            .ok_or(HttpError::Unauthenticated)
    }
}
