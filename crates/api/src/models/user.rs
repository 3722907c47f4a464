//! Account that owns schedules.

use serde::Serialize;

use prime_shine_core::{Email, UserId};

/// A registered user.
///
/// The password hash is never serialized and is redacted from `Debug`.
#[derive(Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[sqlx(rename = "userid")]
    #[serde(rename = "userID")]
    pub id: UserId,
    pub name: String,
    pub email: Email,
    #[sqlx(rename = "password")]
    #[serde(skip)]
    pub password_hash: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}
