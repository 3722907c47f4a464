//! Account routes: registration, login, token handshake and account changes.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use prime_shine_core::Email;

use crate::db::{RepositoryError, RequestScope, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::{Payload, RequireAuth};
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub name: String,
    pub email: Email,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Email,
    pub password: String,
}

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    scope: RequestScope,
    Payload(body): Payload<AccountRequest>,
) -> Result<Json<Value>> {
    let user = scope
        .run(move |tx| {
            Box::pin(async move {
                let user = AuthService::new(tx)
                    .register(&body.name, &body.email, &body.password)
                    .await?;
                Ok(user)
            })
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    let jwt = state.tokens().issue(user.id)?;
    Ok(Json(json!({ "user": user, "jwt": jwt })))
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    Payload(body): Payload<LoginRequest>,
) -> Result<Json<Value>> {
    let mut pool = state.pool().clone();
    let user = AuthService::new(&mut pool)
        .login(&body.email, &body.password)
        .await?;

    let jwt = state.tokens().issue(user.id)?;
    Ok(Json(json!({ "user": user, "jwt": jwt })))
}

/// `POST /api/handshake`
///
/// Confirms a stored token still belongs to an existing account.
pub async fn handshake(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Value>> {
    let mut pool = state.pool().clone();
    let user = UserRepository::new(&mut pool)
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_owned()))?;

    Ok(Json(json!({ "user": user })))
}

/// `POST /api/users/edit`
pub async fn edit(
    RequireAuth(user_id): RequireAuth,
    scope: RequestScope,
    Payload(body): Payload<AccountRequest>,
) -> Result<Json<Value>> {
    let user = scope
        .run(move |tx| {
            Box::pin(async move {
                let user = AuthService::new(tx)
                    .update_account(user_id, &body.name, &body.email, &body.password)
                    .await?;
                Ok(user)
            })
        })
        .await?;

    Ok(Json(json!({ "user": user })))
}

/// `POST /api/users/delete`
///
/// Deletes the account and every schedule it owns.
pub async fn delete(RequireAuth(user_id): RequireAuth, scope: RequestScope) -> Result<Json<Value>> {
    scope
        .run(move |tx| {
            Box::pin(async move {
                UserRepository::new(tx).delete(user_id).await?;
                Ok(())
            })
        })
        .await
        .map_err(|err| match err {
            AppError::Repository(RepositoryError::NotFound(_)) => {
                AppError::Unauthorized("Account no longer exists".to_owned())
            }
            other => other,
        })?;

    tracing::info!(%user_id, "user deleted");
    Ok(Json(json!({ "success": true })))
}
