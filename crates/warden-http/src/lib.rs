//! # warden-http
//!
//! axum integration for `warden-auth`. Sessions travel in a cookie, routes
//! are protected by middleware built from a [`ProtectionPolicy`], and CSRF
//! tokens are read from the query string, a urlencoded form body or a
//! request header.
//!
//! ```rust,ignore
//! let state = AuthState::new(Arc::new(engine), Arc::new(MemorySessionBackend::default()));
//! let admin = state.guard(ProtectionPolicy::builder().role("admin").build()?);
//!
//! let app = Router::new()
//!     .route("/admin", get(admin_page).layer(from_fn_with_state(admin, protect::<Users>)))
//!     .route("/login", post(login))
//!     .layer(from_fn_with_state(state, with_session::<Users>));
//! ```

pub mod cookie;
pub mod error;
pub mod extract;
pub mod middleware;

pub use error::HttpError;
pub use extract::{AuthSession, CurrentUser};
pub use middleware::{protect, with_session, AuthState, RouteGuard, FORM_BODY_LIMIT};

pub use warden_auth::{Decision, ProtectionPolicy};

/// Result type for adapter operations
pub type HttpResult<T> = Result<T, HttpError>;
