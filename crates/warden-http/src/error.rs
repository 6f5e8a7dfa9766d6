//! Adapter errors and their HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;
use warden_auth::AuthError;

/// Errors raised while protecting a request
#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("CSRF token missing or invalid")]
    CsrfRejected,

    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },

    #[error("No session attached to the request")]
    MissingSession,

    #[error("Not signed in")]
    Unauthenticated,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl HttpError {
    /// Create a malformed request error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::CsrfRejected => StatusCode::FORBIDDEN,
            HttpError::MalformedRequest { .. } => StatusCode::BAD_REQUEST,
            HttpError::MissingSession => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Unauthenticated => StatusCode::UNAUTHORIZED,
            HttpError::Auth(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            HttpError::Auth(_) | HttpError::MissingSession => {
                error!(error = %self, "authentication layer failure");
                "Authentication error".to_string()
            }
            other => other.to_string(),
        };

        (status, message).into_response()
    }
}
