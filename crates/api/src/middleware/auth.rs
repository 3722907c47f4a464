//! Bearer token authentication extractor.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use prime_shine_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Extractor that requires a valid token.
///
/// Reads `Authorization: Bearer <jwt>`; a bare token without the scheme is
/// accepted as well. Missing or invalid tokens are rejected with 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user_id): RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {user_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth(pub UserId);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_owned()))?;

        let user_id = state.tokens().verify(token).map_err(|err| {
            tracing::debug!(error = %err, "token rejected");
            AppError::Unauthorized("Invalid or expired token".to_owned())
        })?;

        set_sentry_user(&user_id);
        Ok(Self(user_id))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest,
        _ if value.trim_end().eq_ignore_ascii_case("bearer") => "",
        _ => value,
    }
    .trim();
    (!token.is_empty()).then_some(token)
}
