//! Session and route protection middleware
//!
//! [`with_session`] opens the request's session and exposes it to handlers.
//! [`protect`] does the same and then lets the [`ProtectionEngine`] decide
//! whether the route's handler runs:
//!
//! - `Allow` runs the handler with [`CurrentUser`] available
//! - `RedirectToSignIn` answers `303 See Other` with a `Location` header
//! - `RejectForbidden` answers `403 Forbidden`

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use warden_auth::{
    AuthError, Decision, Identity, ProtectionEngine, ProtectionPolicy, RequestContext,
    SessionBackend, UserRepository,
};

use crate::cookie::{append_session_cookie, session_id_from_headers};
use crate::error::HttpError;
use crate::extract::{AuthSession, CurrentUser};

/// Largest form body buffered for CSRF token extraction
pub const FORM_BODY_LIMIT: usize = 2 * 1024 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Shared state for the session middleware
pub struct AuthState<R: UserRepository> {
    engine: Arc<ProtectionEngine<R>>,
    backend: Arc<dyn SessionBackend>,
}

impl<R: UserRepository> AuthState<R> {
    /// Create middleware state from an engine and a session backend
    pub fn new(engine: Arc<ProtectionEngine<R>>, backend: Arc<dyn SessionBackend>) -> Self {
        Self { engine, backend }
    }

    /// Guard for a route protected by `policy`
    pub fn guard(&self, policy: ProtectionPolicy<R::User>) -> RouteGuard<R> {
        RouteGuard {
            state: self.clone(),
            policy: Arc::new(policy),
        }
    }

    /// The protection engine
    pub fn engine(&self) -> &Arc<ProtectionEngine<R>> {
        &self.engine
    }

    /// The session backend
    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    /// Attach the request's session, reusing one an outer layer already
    /// opened. Returns the session and whether the client needs a cookie.
    async fn attach(&self, request: &mut Request) -> Result<(AuthSession<R>, bool), HttpError> {
        if let Some(session) = request.extensions().get::<AuthSession<R>>() {
            return Ok((session.clone(), false));
        }

        let cookie_name = &self.engine.config().session.cookie_name;
        let presented = session_id_from_headers(request.headers(), cookie_name);
        let opened = self.backend.open(presented.as_deref()).await?;

        let needs_cookie = opened.created || presented.as_deref() != Some(opened.id.as_str());
        if needs_cookie {
            debug!(path = %request.uri().path(), "opened new session");
        }

        let session = AuthSession::new(opened.id, opened.store, self.engine.clone());
        request.extensions_mut().insert(session.clone());
        Ok((session, needs_cookie))
    }

    fn finish(&self, mut response: Response, session: &AuthSession<R>, needs_cookie: bool) -> Response {
        if needs_cookie {
            append_session_cookie(response.headers_mut(), &self.engine.config().session, session.id());
        }
        response
    }
}

impl<R: UserRepository> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            backend: self.backend.clone(),
        }
    }
}

/// Per-route state for [`protect`]
pub struct RouteGuard<R: UserRepository> {
    state: AuthState<R>,
    policy: Arc<ProtectionPolicy<R::User>>,
}

impl<R: UserRepository> RouteGuard<R> {
    /// The route's policy
    pub fn policy(&self) -> &ProtectionPolicy<R::User> {
        &self.policy
    }

    async fn run(&self, request: Request, session: &AuthSession<R>, next: Next) -> Result<Response, HttpError> {
        let (mut request, ctx) = self.request_context(request).await?;
        let engine = &self.state.engine;

        match engine.decide(&ctx, session.store(), session.cache(), &self.policy).await {
            Decision::Allow => {
                if let Some(user) = session.cache().get().and_then(Identity::user) {
                    request.extensions_mut().insert(CurrentUser(user.clone()));
                }
                Ok(next.run(request).await)
            }
            Decision::RedirectToSignIn(url) => self.redirect(&url),
            Decision::RejectForbidden => Err(HttpError::CsrfRejected),
        }
    }

    /// `303 See Other` to the sign-in page. A computed URL that is not a
    /// valid header value falls back to the configured default.
    fn redirect(&self, url: &str) -> Result<Response, HttpError> {
        let location = match HeaderValue::from_str(url) {
            Ok(location) => location,
            Err(_) => {
                warn!(url = ?url, "sign-in URL is not a valid Location value, using the default");
                let fallback = &self.state.engine.config().sign_in_url;
                HeaderValue::from_str(fallback).map_err(|_| {
                    AuthError::config_error("sign_in_url is not a valid Location value")
                })?
            }
        };

        Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
    }

    /// Build the engine's view of the request. The body is only buffered
    /// when a CSRF token is required and may arrive as a form field; the
    /// handler receives the same bytes afterwards.
    async fn request_context(&self, request: Request) -> Result<(Request, RequestContext), HttpError> {
        let mut ctx = RequestContext::new(request.method().clone(), request.uri().path());
        ctx.query = parse_pairs(request.uri().query().unwrap_or_default().as_bytes())?;
        ctx.headers = request.headers().clone();

        if !self.state.engine.csrf_required(&self.policy, &ctx) || !is_form(request.headers()) {
            return Ok((request, ctx));
        }

        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, FORM_BODY_LIMIT)
            .await
            .map_err(|err| HttpError::malformed(err.to_string()))?;
        ctx.form = parse_pairs(&bytes)?;

        Ok((Request::from_parts(parts, Body::from(bytes)), ctx))
    }
}

impl<R: UserRepository> Clone for RouteGuard<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            policy: self.policy.clone(),
        }
    }
}

/// Open the session for every request and expose it as [`AuthSession`]
pub async fn with_session<R: UserRepository>(
    State(state): State<AuthState<R>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (session, needs_cookie) = match state.attach(&mut request).await {
        Ok(attached) => attached,
        Err(err) => return err.into_response(),
    };

    let response = next.run(request).await;
    state.finish(response, &session, needs_cookie)
}

/// Protect a route with its [`RouteGuard`]
pub async fn protect<R: UserRepository>(
    State(guard): State<RouteGuard<R>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (session, needs_cookie) = match guard.state.attach(&mut request).await {
        Ok(attached) => attached,
        Err(err) => return err.into_response(),
    };

    let response = match guard.run(request, &session, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    guard.state.finish(response, &session, needs_cookie)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Decode urlencoded pairs; a repeated key keeps its first value
fn parse_pairs(raw: &[u8]) -> Result<HashMap<String, String>, HttpError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(raw).map_err(|err| HttpError::malformed(err.to_string()))?;

    let mut map = HashMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        map.entry(key).or_insert(value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs_keeps_first_value() {
        let pairs = parse_pairs(b"r=123&_csrf_token=a%2Bb&r=456").unwrap();
        assert_eq!(pairs.get("r").map(String::as_str), Some("123"));
        assert_eq!(pairs.get("_csrf_token").map(String::as_str), Some("a+b"));
        assert!(parse_pairs(b"").unwrap().is_empty());
    }

    #[test]
    fn test_form_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        assert!(is_form(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_form(&headers));
    }
}
