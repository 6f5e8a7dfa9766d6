//! Protection decision engine
//!
//! Combines identity resolution, authorization and CSRF validation into one
//! [`Decision`] per request. Every request walks the same stages:
//!
//! ```text
//! Start -> IdentityResolved -> Authorized -> CsrfChecked -> Done
//!    \              \              \
//!     Redirect       Redirect       Forbidden
//! ```
//!
//! Anonymous requests and authorization failures share the sign-in redirect,
//! so a client cannot tell which check turned it away. CSRF failures are
//! rejected outright and never redirected.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::authorization::AuthorizationEngine;
use crate::config::AuthConfig;
use crate::context::RequestContext;
use crate::csrf::CsrfTokenManager;
use crate::identity::{Identity, IdentityCache, IdentityResolver};
use crate::notify::notify_user;
use crate::policy::{ProtectionPolicy, SignInUrl};
use crate::traits::{Notifier, SessionStore, UserRepository};
use crate::AuthResult;

/// Outcome of protecting one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Run the protected handler
    Allow,
    /// Send the client to the sign-in page
    RedirectToSignIn(String),
    /// Refuse the request
    RejectForbidden,
}

impl Decision {
    /// Whether the handler may run
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Redirect target, for redirect decisions
    pub fn location(&self) -> Option<&str> {
        match self {
            Decision::RedirectToSignIn(url) => Some(url),
            _ => None,
        }
    }

    /// HTTP status an adapter should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Decision::Allow => 200,
            Decision::RedirectToSignIn(_) => 303,
            Decision::RejectForbidden => 403,
        }
    }
}

/// Stages of a single decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    IdentityResolved,
    Authorized,
    CsrfChecked,
    Done,
    Redirect,
    Forbidden,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::IdentityResolved => "identity_resolved",
            Stage::Authorized => "authorized",
            Stage::CsrfChecked => "csrf_checked",
            Stage::Done => "done",
            Stage::Redirect => "redirect",
            Stage::Forbidden => "forbidden",
        };
        f.write_str(name)
    }
}

/// Decides whether protected requests may proceed
pub struct ProtectionEngine<R: UserRepository> {
    config: Arc<AuthConfig>,
    identity: IdentityResolver<R>,
    authorization: AuthorizationEngine,
    csrf: CsrfTokenManager,
    notifier: Option<Arc<dyn Notifier>>,
    sign_in_url: Option<SignInUrl>,
}

impl<R: UserRepository> ProtectionEngine<R> {
    /// Create an engine; the configuration is validated first
    pub fn new(config: Arc<AuthConfig>, repository: Arc<R>) -> AuthResult<Self> {
        config.validate()?;

        Ok(Self {
            csrf: CsrfTokenManager::new(config.csrf.clone()),
            identity: IdentityResolver::new(repository),
            authorization: AuthorizationEngine::new(),
            notifier: None,
            sign_in_url: None,
            config,
        })
    }

    /// Attach a notifier for setup-time glue
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the configured default sign-in URL, for example with one
    /// computed per request. Routes with their own URL still use theirs.
    pub fn with_sign_in_url(mut self, url: impl Into<SignInUrl>) -> AuthResult<Self> {
        let url = url.into();
        url.validate()?;
        self.sign_in_url = Some(url);
        Ok(self)
    }

    /// The engine configuration
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The identity resolver
    pub fn identity(&self) -> &IdentityResolver<R> {
        &self.identity
    }

    /// The CSRF token manager
    pub fn csrf(&self) -> &CsrfTokenManager {
        &self.csrf
    }

    /// Decide the fate of one request
    pub async fn decide(
        &self,
        ctx: &RequestContext,
        session: &dyn SessionStore,
        cache: &IdentityCache<R::User>,
        policy: &ProtectionPolicy<R::User>,
    ) -> Decision {
        debug!(stage = %Stage::Start, method = %ctx.method, path = %ctx.path, "protecting request");

        let user = match self.identity.resolve(session, cache).await {
            Identity::User(user) => user,
            Identity::Anonymous => {
                debug!(stage = %Stage::Redirect, "anonymous request");
                return Decision::RedirectToSignIn(self.sign_in_url(policy, ctx));
            }
        };
        debug!(stage = %Stage::IdentityResolved, "identity resolved");

        if let Err(err) = self.authorization.evaluate(user, policy, ctx) {
            debug!(stage = %Stage::Redirect, reason = %err, "authorization failed");
            return Decision::RedirectToSignIn(self.sign_in_url(policy, ctx));
        }
        debug!(stage = %Stage::Authorized, "authorization passed");

        if self.csrf_required(policy, ctx) {
            if !self.csrf.validate_request(session, ctx).await {
                debug!(stage = %Stage::Forbidden, "CSRF validation failed");
                return Decision::RejectForbidden;
            }
            debug!(stage = %Stage::CsrfChecked, "CSRF token accepted");
        }

        debug!(stage = %Stage::Done, "request allowed");
        Decision::Allow
    }

    /// Sign-in URL for a request: the policy's own, else the engine default,
    /// else the configured one
    pub fn sign_in_url(&self, policy: &ProtectionPolicy<R::User>, ctx: &RequestContext) -> String {
        match policy.sign_in_url().or(self.sign_in_url.as_ref()) {
            Some(url) => url.resolve(ctx),
            None => self.config.sign_in_url.clone(),
        }
    }

    /// Whether this request must carry a valid CSRF token
    pub fn csrf_required(&self, policy: &ProtectionPolicy<R::User>, ctx: &RequestContext) -> bool {
        policy.csrf_mode().requires_token(&ctx.method)
    }

    /// Issue (or return) the session's CSRF token
    pub async fn issue_csrf_token(&self, session: &dyn SessionStore) -> AuthResult<String> {
        self.csrf.issue(session).await
    }

    /// Bind the session to a user
    pub async fn login(&self, session: &dyn SessionStore, user: &R::User) -> AuthResult<()> {
        self.identity.login(session, user).await
    }

    /// Clear the session's user and CSRF token
    pub async fn logout(&self, session: &dyn SessionStore) -> AuthResult<()> {
        self.identity.logout(session).await
    }

    /// Notify a user through the configured notifier; best-effort
    pub async fn notify(&self, user: &R::User, subject: &str, body: &str) -> bool {
        match &self.notifier {
            Some(notifier) => notify_user(notifier.as_ref(), user, subject, body).await,
            None => false,
        }
    }
}

impl<R: UserRepository> fmt::Debug for ProtectionEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionEngine")
            .field("config", &self.config)
            .field("csrf", &self.csrf)
            .field("notifier", &self.notifier.is_some())
            .field("sign_in_url", &self.sign_in_url)
            .finish()
    }
}
