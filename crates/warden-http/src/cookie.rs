//! Session cookie parsing and construction

use axum::http::{header, HeaderMap, HeaderValue};
use warden_auth::SessionConfig;

/// Extract the session id from the request's `Cookie` headers
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookies| session_id_from_cookie(cookies, cookie_name))
}

/// Extract the session id from a single `Cookie` header value
pub fn session_id_from_cookie(cookie_header: &str, cookie_name: &str) -> Option<String> {
    let prefix = format!("{}=", cookie_name);
    cookie_header
        .split(';')
        .map(str::trim)
        .filter_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Build the `Set-Cookie` value for a session
pub fn session_cookie(config: &SessionConfig, session_id: &str) -> String {
    let mut cookie = format!("{}={}", config.cookie_name, session_id);

    cookie.push_str(&format!("; Path={}", config.cookie_path));

    if config.cookie_http_only {
        cookie.push_str("; HttpOnly");
    }

    if config.cookie_secure {
        cookie.push_str("; Secure");
    }

    cookie.push_str(&format!("; SameSite={}", config.cookie_same_site));
    cookie.push_str(&format!("; Max-Age={}", config.expiry));

    cookie
}

/// Append the session cookie to response headers
pub(crate) fn append_session_cookie(headers: &mut HeaderMap, config: &SessionConfig, session_id: &str) {
    match HeaderValue::from_str(&session_cookie(config, session_id)) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(err) => tracing::warn!(error = %err, "session cookie is not a valid header value"),
    }
}
