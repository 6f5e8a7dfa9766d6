//! # warden-auth: session authentication and route protection
//!
//! Manages login sessions, protects routes behind authentication, role and
//! custom predicate checks, and defends state-changing requests with
//! session-bound CSRF tokens. The heart of the crate is
//! [`ProtectionEngine::decide`], which turns a request, its session and a
//! [`ProtectionPolicy`] into a [`Decision`].
//!
//! User storage, session transport and mail delivery stay outside; they plug
//! in through the traits in [`traits`].
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use warden_auth::{
//!     AuthConfig, AuthResult, Authenticatable, Decision, IdentityCache, MemorySession,
//!     ProtectionEngine, ProtectionPolicy, RequestContext, UserRepository,
//! };
//!
//! #[derive(Clone)]
//! struct Member {
//!     id: u32,
//!     roles: Vec<String>,
//! }
//!
//! impl Authenticatable for Member {
//!     type Id = u32;
//!
//!     fn id(&self) -> &u32 {
//!         &self.id
//!     }
//!
//!     fn roles(&self) -> Vec<String> {
//!         self.roles.clone()
//!     }
//! }
//!
//! struct Members(Member);
//!
//! #[async_trait]
//! impl UserRepository for Members {
//!     type User = Member;
//!
//!     async fn find_by_id(&self, id: &str) -> AuthResult<Option<Member>> {
//!         Ok((self.0.id.to_string() == id).then(|| self.0.clone()))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let admin = Member { id: 1, roles: vec!["admin".to_string()] };
//! let engine = ProtectionEngine::new(
//!     Arc::new(AuthConfig::default()),
//!     Arc::new(Members(admin.clone())),
//! )?;
//! let policy = ProtectionPolicy::builder().role("admin").build()?;
//! let session = MemorySession::new();
//! let ctx = RequestContext::get("/admin");
//!
//! let decision = engine.decide(&ctx, &session, &IdentityCache::new(), &policy).await;
//! assert_eq!(decision, Decision::RedirectToSignIn("/sign-in/".to_string()));
//!
//! engine.login(&session, &admin).await?;
//! let decision = engine.decide(&ctx, &session, &IdentityCache::new(), &policy).await;
//! assert_eq!(decision, Decision::Allow);
//! # Ok::<(), warden_auth::AuthError>(())
//! # }).unwrap();
//! ```

pub mod authorization;
pub mod config;
pub mod context;
pub mod csrf;
pub mod decision;
pub mod error;
pub mod identity;
pub mod notify;
pub mod policy;
pub mod session;
pub mod traits;

// Error handling
pub use error::AuthError;

// Collaborator traits
pub use traits::{
    Authenticatable, Notifier, OpenedSession, SessionBackend, SessionStore, UserRepository,
    CSRF_TOKEN_KEY, USER_ID_KEY,
};

// Configuration
pub use config::{is_valid_sign_in_url, AuthConfig, CookieSameSite, CsrfConfig, SessionConfig};

// Engine and its parts
pub use authorization::AuthorizationEngine;
pub use context::RequestContext;
pub use csrf::CsrfTokenManager;
pub use decision::{Decision, ProtectionEngine, Stage};
pub use identity::{Identity, IdentityCache, IdentityResolver};
pub use notify::{notify_user, TracingNotifier};
pub use policy::{CsrfMode, Predicate, ProtectionPolicy, ProtectionPolicyBuilder, SignInUrl};
pub use session::{MemorySession, MemorySessionBackend};

/// Authentication result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
