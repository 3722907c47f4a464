//! User account commands.
//!
//! Accounts are created through the same registration path as
//! `POST /api/register`: password policy, Argon2 hashing, email uniqueness
//! and a single committed unit of work.

use prime_shine_api::db::{Cancellation, RequestScope};
use prime_shine_api::error::AppError;
use prime_shine_api::services::auth::AuthService;
use prime_shine_core::{Email, EmailError};
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Could not create user: {0}")]
    Create(#[from] AppError),
}

/// Create a user and return its id.
pub async fn create(name: &str, email: &str, password: &str) -> Result<i32, UserError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;

    let name = name.to_owned();
    let password = password.to_owned();
    let user = RequestScope::new(pool, Cancellation::never())
        .run(move |tx| {
            Box::pin(async move {
                let user = AuthService::new(tx)
                    .register(&name, &email, &password)
                    .await?;
                Ok(user)
            })
        })
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User created");
    Ok(user.id.as_i32())
}
