//! Schedule repository.
//!
//! A user has at most one schedule per start day.

use chrono::NaiveDate;

use prime_shine_core::{ScheduleId, UserId};

use super::RepositoryError;
use super::executor::{ReadExecutor, WriteExecutor};
use super::filter::{Filter, Statement};
use super::schedule_days::ScheduleDayRepository;
use super::users::UserRepository;
use crate::models::Schedule;

const TABLE: &str = "schedules";
const COLUMNS: &str = "scheduleid, userid, start_day";
const ENTITY: &str = "schedule";

/// Repository for schedule database operations.
pub struct ScheduleRepository<'a, E> {
    conn: &'a mut E,
}

impl<'a, E> ScheduleRepository<'a, E> {
    #[must_use]
    pub const fn new(conn: &'a mut E) -> Self {
        Self { conn }
    }
}

impl<E: ReadExecutor> ScheduleRepository<'_, E> {
    /// Find the first schedule matching every condition in `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::EmptyFilter` for an empty filter and
    /// `RepositoryError::Database` if the query fails.
    pub async fn find_one(&mut self, filter: Filter) -> Result<Option<Schedule>, RepositoryError> {
        let stmt = Statement::select_one(TABLE, COLUMNS, filter)?;
        Ok(self.conn.fetch_optional(&stmt).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&mut self, id: ScheduleId) -> Result<Option<Schedule>, RepositoryError> {
        self.find_one(Filter::new().eq("scheduleid", id)).await
    }

    /// All schedules owned by `user_id`, earliest start day first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn query_many(&mut self, user_id: UserId) -> Result<Vec<Schedule>, RepositoryError> {
        let stmt = Statement::select_many(
            TABLE,
            COLUMNS,
            Filter::new().eq("userid", user_id),
            "start_day, scheduleid",
        )?;
        Ok(self.conn.fetch_all(&stmt).await?)
    }

    async fn find_by_key(
        &mut self,
        user_id: UserId,
        start_day: NaiveDate,
    ) -> Result<Option<Schedule>, RepositoryError> {
        self.find_one(
            Filter::new()
                .eq("userid", user_id)
                .eq("start_day", start_day),
        )
        .await
    }
}

impl<E: WriteExecutor> ScheduleRepository<'_, E> {
    /// Create a schedule for an existing user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist and
    /// `RepositoryError::AlreadyExists` if the user already has a schedule
    /// starting on `start_day`.
    pub async fn create(
        &mut self,
        user_id: UserId,
        start_day: NaiveDate,
    ) -> Result<Schedule, RepositoryError> {
        UserRepository::new(&mut *self.conn)
            .find_by_id(user_id)
            .await?
            .ok_or(RepositoryError::NotFound("user"))?;

        if self.find_by_key(user_id, start_day).await?.is_some() {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new(
            "INSERT INTO schedules (userid, start_day) VALUES ($1, $2) RETURNING scheduleid",
        )
        .bind(user_id)
        .bind(start_day);

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

        self.find_by_id(ScheduleId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// Move a schedule to a new start day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the schedule does not exist and
    /// `RepositoryError::AlreadyExists` if its owner already has a schedule
    /// on the new start day.
    pub async fn edit(
        &mut self,
        id: ScheduleId,
        start_day: NaiveDate,
    ) -> Result<Schedule, RepositoryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        if existing.start_day != start_day
            && self
                .find_by_key(existing.user_id, start_day)
                .await?
                .is_some()
        {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new("UPDATE schedules SET start_day = $1 WHERE scheduleid = $2")
            .bind(start_day)
            .bind(id);
        let affected = self.conn.execute(&stmt).await?;
        RepositoryError::expect_rows(ENTITY, 1, affected)?;

        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// Delete a schedule after deleting each of its days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the schedule does not exist.
    pub async fn delete(&mut self, id: ScheduleId) -> Result<(), RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        let days = ScheduleDayRepository::new(&mut *self.conn)
            .query_many(id)
            .await?;
        for day in days {
            ScheduleDayRepository::new(&mut *self.conn)
                .delete(day.id)
                .await?;
        }

        let stmt = Statement::new("DELETE FROM schedules WHERE scheduleid = $1").bind(id);
        let affected = self.conn.execute(&stmt).await?;
        RepositoryError::expect_rows(ENTITY, 1, affected)
    }
}
