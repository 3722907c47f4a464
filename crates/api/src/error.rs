//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Domain outcomes become a 400
//! or 401 carrying their message; faults are captured to Sentry, logged, and
//! answered with a generic 500 so no internal detail reaches the client.
//! The body is always `{"error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::token::TokenError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// The request was cancelled (deadline or shutdown) before it finished.
    #[error("request cancelled")]
    Cancelled,

    /// Work succeeded but the transaction did not commit.
    #[error("transaction failed to commit: {0}")]
    CommitFailed(#[source] sqlx::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is a server-side fault.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        match self {
            Self::Repository(err) | Self::Auth(AuthError::Repository(err)) => err.is_fault(),
            Self::Auth(AuthError::PasswordHash)
            | Self::Token(_)
            | Self::CommitFailed(_)
            | Self::Internal(_) => true,
            Self::Auth(_) | Self::Unauthorized(_) | Self::BadRequest(_) | Self::Cancelled => false,
        }
    }

    fn status(&self) -> StatusCode {
        if self.is_fault() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match self {
            Self::Auth(AuthError::InvalidCredentials) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::CommitFailed(_) => "Transaction failed to commit".to_owned(),
            _ if self.is_fault() => "Internal server error".to_owned(),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid credentials".to_owned(),
            Self::Cancelled => "Request cancelled".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called once a request's token has been verified.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
