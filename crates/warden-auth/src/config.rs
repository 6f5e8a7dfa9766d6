//! Authentication configuration types and utilities

use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthResult};

/// Smallest accepted CSRF token size, 128 bits of entropy
pub const MIN_CSRF_TOKEN_BYTES: usize = 16;

/// Longest accepted session expiry in seconds (ten years)
pub const MAX_SESSION_EXPIRY: u64 = 10 * 366 * 24 * 60 * 60;

/// Whether a URL can be sent back as a `Location` header
pub fn is_valid_sign_in_url(url: &str) -> bool {
    !url.trim().is_empty() && http::HeaderValue::from_str(url).is_ok()
}

/// Main authentication configuration
///
/// Built once at startup and shared by reference with the protection engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Default sign-in URL used when a policy does not name its own
    #[serde(default = "default_sign_in_url")]
    pub sign_in_url: String,

    /// CSRF token configuration
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Session cookie configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// CSRF token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Query parameter and form field name carrying the token
    #[serde(default = "default_csrf_key")]
    pub key: String,

    /// Header carrying the token
    #[serde(default = "default_csrf_header")]
    pub header: String,

    /// Random bytes per token
    #[serde(default = "default_csrf_token_bytes")]
    pub token_bytes: usize,
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session cookie name
    #[serde(default = "default_session_cookie_name")]
    pub cookie_name: String,

    /// Session cookie path
    #[serde(default = "default_session_cookie_path")]
    pub cookie_path: String,

    /// Session cookie HTTP-only flag
    #[serde(default = "default_true")]
    pub cookie_http_only: bool,

    /// Session cookie secure flag
    #[serde(default = "default_false")]
    pub cookie_secure: bool,

    /// Session cookie SameSite policy
    #[serde(default)]
    pub cookie_same_site: CookieSameSite,

    /// Session expiration time in seconds
    #[serde(default = "default_session_expiry")]
    pub expiry: u64,
}

/// Cookie SameSite attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CookieSameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl std::fmt::Display for CookieSameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CookieSameSite::Strict => write!(f, "Strict"),
            CookieSameSite::Lax => write!(f, "Lax"),
            CookieSameSite::None => write!(f, "None"),
        }
    }
}

// Default value functions
fn default_sign_in_url() -> String {
    "/sign-in/".to_string()
}
fn default_csrf_key() -> String {
    "_csrf_token".to_string()
}
fn default_csrf_header() -> String {
    "X-CSRFToken".to_string()
}
fn default_csrf_token_bytes() -> usize {
    32
}
fn default_session_cookie_name() -> String {
    "warden_session".to_string()
}
fn default_session_cookie_path() -> String {
    "/".to_string()
}
fn default_session_expiry() -> u64 {
    24 * 60 * 60
} // 24 hours
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            sign_in_url: default_sign_in_url(),
            csrf: CsrfConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            key: default_csrf_key(),
            header: default_csrf_header(),
            token_bytes: default_csrf_token_bytes(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie_name(),
            cookie_path: default_session_cookie_path(),
            cookie_http_only: default_true(),
            cookie_secure: default_false(),
            cookie_same_site: CookieSameSite::default(),
            expiry: default_session_expiry(),
        }
    }
}

impl AuthConfig {
    /// Development configuration, cookies allowed over plain HTTP
    pub fn development() -> Self {
        let mut config = Self::default();
        config.session.cookie_secure = false;
        config
    }

    /// Production configuration with strict cookie settings
    pub fn production() -> Self {
        let mut config = Self::default();
        config.session.cookie_secure = true;
        config.session.cookie_same_site = CookieSameSite::Strict;
        config
    }

    /// Parse a JSON document and validate the result
    pub fn from_json(raw: &str) -> AuthResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the default sign-in URL
    pub fn with_sign_in_url(mut self, url: impl Into<String>) -> Self {
        self.sign_in_url = url.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> AuthResult<()> {
        if self.sign_in_url.trim().is_empty() {
            return Err(AuthError::config_error("sign_in_url cannot be empty"));
        }

        if !is_valid_sign_in_url(&self.sign_in_url) {
            return Err(AuthError::config_error(format!(
                "sign_in_url is not a valid Location value: {:?}",
                self.sign_in_url
            )));
        }

        if self.csrf.key.is_empty() {
            return Err(AuthError::config_error("CSRF key cannot be empty"));
        }

        if http::HeaderName::from_bytes(self.csrf.header.as_bytes()).is_err() {
            return Err(AuthError::config_error(format!(
                "Invalid CSRF header name: {:?}",
                self.csrf.header
            )));
        }

        if self.csrf.token_bytes < MIN_CSRF_TOKEN_BYTES {
            return Err(AuthError::config_error(format!(
                "CSRF tokens need at least {} random bytes",
                MIN_CSRF_TOKEN_BYTES
            )));
        }

        if self.session.cookie_name.is_empty() {
            return Err(AuthError::config_error("Session cookie name cannot be empty"));
        }

        if self.session.expiry == 0 {
            return Err(AuthError::config_error("Session expiry must be positive"));
        }

        if self.session.expiry > MAX_SESSION_EXPIRY {
            return Err(AuthError::config_error(format!(
                "Session expiry cannot exceed {} seconds",
                MAX_SESSION_EXPIRY
            )));
        }

        Ok(())
    }
}
