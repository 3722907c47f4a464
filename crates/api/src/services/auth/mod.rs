//! Authentication service.
//!
//! Password registration, login, and credential changes. Passwords are
//! hashed with Argon2id; only the PHC string is stored.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use prime_shine_core::{Email, UserId};

use crate::db::users::UserRepository;
use crate::db::{ReadExecutor, WriteExecutor};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service over any executor.
///
/// Login only needs to read, so it can run directly on the pool;
/// registration and edits need a [`WriteExecutor`].
pub struct AuthService<'a, E> {
    users: UserRepository<'a, E>,
}

impl<'a, E> AuthService<'a, E> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(conn: &'a mut E) -> Self {
        Self {
            users: UserRepository::new(conn),
        }
    }
}

impl<E: ReadExecutor> AuthService<'_, E> {
    /// Login with email and password.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&mut self, email: &Email, password: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password_hash)?;

        Ok(user)
    }
}

impl<E: WriteExecutor> AuthService<'_, E> {
    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::Repository` with `AlreadyExists` if the email is
    /// already registered.
    pub async fn register(
        &mut self,
        name: &str,
        email: &Email,
        password: &str,
    ) -> Result<User, AuthError> {
        validate_name(name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        Ok(self.users.create(name.trim(), email, &password_hash).await?)
    }

    /// Replace a user's name, email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for an invalid password and
    /// `AuthError::Repository` if the user is gone or the email is taken.
    pub async fn update_account(
        &mut self,
        id: UserId,
        name: &str,
        email: &Email,
        password: &str,
    ) -> Result<User, AuthError> {
        validate_name(name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        Ok(self.users.edit(id, name.trim(), email, &password_hash).await?)
    }
}

fn validate_name(name: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::InvalidInput("name cannot be empty".to_owned()));
    }
    Ok(())
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
