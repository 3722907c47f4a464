//! User repository.
//!
//! Emails are unique. The check runs before the insert so a duplicate is
//! rejected without writing anything; the unique index catches the race
//! between two concurrent registrations and maps to the same error.

use prime_shine_core::{Email, UserId};

use super::executor::{ReadExecutor, WriteExecutor};
use super::filter::{Filter, Statement};
use super::schedules::ScheduleRepository;
use super::RepositoryError;
use crate::models::User;

const TABLE: &str = "users";
const COLUMNS: &str = "userid, name, email, password";
const ENTITY: &str = "user";

/// Repository for user database operations.
pub struct UserRepository<'a, E> {
    conn: &'a mut E,
}

impl<'a, E> UserRepository<'a, E> {
    #[must_use]
    pub const fn new(conn: &'a mut E) -> Self {
        Self { conn }
    }
}

impl<E: ReadExecutor> UserRepository<'_, E> {
    /// Find the first user matching every condition in `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::EmptyFilter` for an empty filter and
    /// `RepositoryError::Database` if the query fails.
    pub async fn find_one(&mut self, filter: Filter) -> Result<Option<User>, RepositoryError> {
        let stmt = Statement::select_one(TABLE, COLUMNS, filter)?;
        Ok(self.conn.fetch_optional(&stmt).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.find_one(Filter::new().eq("userid", id)).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_email(&mut self, email: &Email) -> Result<Option<User>, RepositoryError> {
        self.find_one(Filter::new().eq("email", email)).await
    }
}

impl<E: WriteExecutor> UserRepository<'_, E> {
    /// Create a user. The password must already be hashed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::AlreadyExists` if the email is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &mut self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new(
            "INSERT INTO users (name, email, password) VALUES ($1, $2, $3) RETURNING userid",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash);

        let id = self
            .conn
            .insert_returning_id(&stmt)
            .await
            .map_err(RepositoryError::from_write(ENTITY))?
            .ok_or(RepositoryError::NotMutated {
                entity: ENTITY,
                expected: 1,
                actual: 0,
            })?;

        self.find_by_id(UserId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// Replace a user's name, email and password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist and
    /// `RepositoryError::AlreadyExists` if the new email belongs to someone
    /// else.
    pub async fn edit(
        &mut self,
        id: UserId,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        if existing.email != *email && self.find_by_email(email).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new(
            "UPDATE users SET name = $1, email = $2, password = $3 WHERE userid = $4",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(id);

        let affected = self
            .conn
            .execute(&stmt)
            .await
            .map_err(RepositoryError::from_write(ENTITY))?;
        RepositoryError::expect_rows(ENTITY, 1, affected)?;

        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// Delete a user and everything they own.
    ///
    /// Each schedule is deleted first (which in turn deletes its days and
    /// visits), then the user row. Any failure leaves the unit of work to
    /// roll back the partial cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn delete(&mut self, id: UserId) -> Result<(), RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        let schedules = ScheduleRepository::new(&mut *self.conn)
            .query_many(id)
            .await?;
        for schedule in schedules {
            ScheduleRepository::new(&mut *self.conn)
                .delete(schedule.id)
                .await?;
        }

        let stmt = Statement::new("DELETE FROM users WHERE userid = $1").bind(id);
        let affected = self.conn.execute(&stmt).await?;
        RepositoryError::expect_rows(ENTITY, 1, affected)
    }
}
