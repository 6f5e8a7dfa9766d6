//! Session-bound CSRF tokens
//!
//! A token is a random value stored in the session. It stays the same for the
//! life of the session so several tabs and cached forms keep working, and it
//! only validates against the session it was issued for.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{thread_rng, RngCore};
use tracing::{debug, warn};

use crate::config::CsrfConfig;
use crate::context::RequestContext;
use crate::traits::{SessionStore, CSRF_TOKEN_KEY};
use crate::AuthResult;

/// Issues and checks CSRF tokens
#[derive(Debug, Clone)]
pub struct CsrfTokenManager {
    config: CsrfConfig,
}

impl CsrfTokenManager {
    /// Create a manager from configuration
    pub fn new(config: CsrfConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Return the session's token, generating and storing one if needed
    pub async fn issue(&self, session: &dyn SessionStore) -> AuthResult<String> {
        if let Some(token) = session.get(CSRF_TOKEN_KEY).await? {
            if !token.is_empty() {
                return Ok(token);
            }
        }

        let token = self.generate_token();
        session.set(CSRF_TOKEN_KEY, token.clone()).await?;
        debug!("issued CSRF token");
        Ok(token)
    }

    /// Check a presented token against the session's stored token
    pub async fn validate(&self, session: &dyn SessionStore, presented: &str) -> bool {
        let stored = match session.get(CSRF_TOKEN_KEY).await {
            Ok(Some(stored)) if !stored.is_empty() => stored,
            Ok(_) => return false,
            Err(err) => {
                warn!(error = %err, "could not read CSRF token from session");
                return false;
            }
        };

        constant_time_eq(stored.as_bytes(), presented.as_bytes())
    }

    /// Find the presented token: query parameter, then form field, then header.
    /// The first non-empty value wins.
    pub fn extract_token<'r>(&self, ctx: &'r RequestContext) -> Option<&'r str> {
        ctx.query
            .get(&self.config.key)
            .map(String::as_str)
            .filter(|token| !token.is_empty())
            .or_else(|| {
                ctx.form
                    .get(&self.config.key)
                    .map(String::as_str)
                    .filter(|token| !token.is_empty())
            })
            .or_else(|| {
                ctx.header(&self.config.header)
                    .filter(|token| !token.is_empty())
            })
    }

    /// Extract the presented token from the request and validate it
    pub async fn validate_request(&self, session: &dyn SessionStore, ctx: &RequestContext) -> bool {
        match self.extract_token(ctx) {
            Some(token) => self.validate(session, token).await,
            None => false,
        }
    }

    fn generate_token(&self) -> String {
        let mut bytes = vec![0u8; self.config.token_bytes];
        thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
