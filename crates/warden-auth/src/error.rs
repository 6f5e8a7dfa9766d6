//! Authentication and authorization error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication and authorization errors
///
/// Per-request failures are folded into a [`Decision`](crate::Decision) by the
/// protection engine and never reach the caller; these values surface from
/// setup-time calls and from the collaborator traits.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// The session pointed at a user that could not be resolved
    #[error("Identity resolution failed: {message}")]
    IdentityResolution { message: String },

    /// The session store could not be read or written
    #[error("Session error: {message}")]
    SessionError { message: String },

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Role or predicate check failed
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Presented CSRF token was missing or did not match the session token
    #[error("CSRF token validation failed")]
    CsrfValidationFailed,

    /// Invalid configuration or protection policy
    #[error("Authentication configuration error: {message}")]
    ConfigurationError { message: String },

    /// Outbound notification failed
    #[error("Notification error: {message}")]
    NotificationError { message: String },
}

impl AuthError {
    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::IdentityResolution { .. } => "IDENTITY_RESOLUTION",
            AuthError::SessionError { .. } => "SESSION_ERROR",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::AccessDenied { .. } => "ACCESS_DENIED",
            AuthError::CsrfValidationFailed => "CSRF_VALIDATION_FAILED",
            AuthError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AuthError::NotificationError { .. } => "NOTIFICATION_ERROR",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::IdentityResolution { .. } => 401,
            AuthError::SessionError { .. } => 401,
            AuthError::UserNotFound => 401, // Don't reveal user existence
            AuthError::AccessDenied { .. } => 403, // Decisions redirect; direct errors forbid
            AuthError::CsrfValidationFailed => 403,
            AuthError::ConfigurationError { .. } => 500,
            AuthError::NotificationError { .. } => 500,
        }
    }

    /// Create an identity resolution error
    pub fn identity_error(message: impl Into<String>) -> Self {
        Self::IdentityResolution { message: message.into() }
    }

    /// Create a session error
    pub fn session_error(message: impl Into<String>) -> Self {
        Self::SessionError { message: message.into() }
    }

    /// Create an access denied error
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied { message: message.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Create a notification error
    pub fn notification_error(message: impl Into<String>) -> Self {
        Self::NotificationError { message: message.into() }
    }

    /// Whether the error belongs to setup time rather than to a single request
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthError::ConfigurationError { .. })
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::config_error(err.to_string())
    }
}
