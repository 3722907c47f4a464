//! Schedule day repository.
//!
//! A schedule has at most one day per offset. Scheduled customers hang off
//! a day by `(scheduleid, day_offset)` rather than by the day's own key, so
//! changing a day's offset also moves its customers.

use prime_shine_core::{DayOffset, ScheduleDayId, ScheduleId};

use super::RepositoryError;
use super::executor::{ReadExecutor, WriteExecutor};
use super::filter::{Filter, Statement};
use super::scheduled_customers::ScheduledCustomerRepository;
use super::schedules::ScheduleRepository;
use crate::models::ScheduleDay;

const TABLE: &str = "schedule_days";
const COLUMNS: &str = "scheduledayid, scheduleid, day_offset";
const ENTITY: &str = "schedule day";

/// Repository for schedule day database operations.
pub struct ScheduleDayRepository<'a, E> {
    conn: &'a mut E,
}

impl<'a, E> ScheduleDayRepository<'a, E> {
    #[must_use]
    pub const fn new(conn: &'a mut E) -> Self {
        Self { conn }
    }
}

impl<E: ReadExecutor> ScheduleDayRepository<'_, E> {
    /// Find the first schedule day matching every condition in `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::EmptyFilter` for an empty filter and
    /// `RepositoryError::Database` if the query fails.
    pub async fn find_one(
        &mut self,
        filter: Filter,
    ) -> Result<Option<ScheduleDay>, RepositoryError> {
        let stmt = Statement::select_one(TABLE, COLUMNS, filter)?;
        Ok(self.conn.fetch_optional(&stmt).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(
        &mut self,
        id: ScheduleDayId,
    ) -> Result<Option<ScheduleDay>, RepositoryError> {
        self.find_one(Filter::new().eq("scheduledayid", id)).await
    }

    /// The day of `schedule_id` at `day_offset`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_offset(
        &mut self,
        schedule_id: ScheduleId,
        day_offset: DayOffset,
    ) -> Result<Option<ScheduleDay>, RepositoryError> {
        self.find_one(
            Filter::new()
                .eq("scheduleid", schedule_id)
                .eq("day_offset", day_offset),
        )
        .await
    }

    /// All days of a schedule in offset order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn query_many(
        &mut self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<ScheduleDay>, RepositoryError> {
        let stmt = Statement::select_many(
            TABLE,
            COLUMNS,
            Filter::new().eq("scheduleid", schedule_id),
            "day_offset, scheduledayid",
        )?;
        Ok(self.conn.fetch_all(&stmt).await?)
    }
}

impl<E: WriteExecutor> ScheduleDayRepository<'_, E> {
    /// Add a day to an existing schedule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the schedule does not exist and
    /// `RepositoryError::AlreadyExists` if the offset is already taken.
    pub async fn create(
        &mut self,
        schedule_id: ScheduleId,
        day_offset: DayOffset,
    ) -> Result<ScheduleDay, RepositoryError> {
        ScheduleRepository::new(&mut *self.conn)
            .find_by_id(schedule_id)
            .await?
            .ok_or(RepositoryError::NotFound("schedule"))?;

        if self
            .find_by_offset(schedule_id, day_offset)
            .await?
            .is_some()
        {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new(
            "INSERT INTO schedule_days (scheduleid, day_offset) VALUES ($1, $2) RETURNING scheduledayid",
        )
        .bind(schedule_id)
        .bind(day_offset);

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

        self.find_by_id(ScheduleDayId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// Move a day to a new offset, taking its scheduled customers along.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the day does not exist and
    /// `RepositoryError::AlreadyExists` if the target offset is taken.
    pub async fn edit(
        &mut self,
        id: ScheduleDayId,
        day_offset: DayOffset,
    ) -> Result<ScheduleDay, RepositoryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        if existing.day_offset == day_offset {
            return Ok(existing);
        }

        if self
            .find_by_offset(existing.schedule_id, day_offset)
            .await?
            .is_some()
        {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new("UPDATE schedule_days SET day_offset = $1 WHERE scheduledayid = $2")
            .bind(day_offset)
            .bind(id);
        let affected = self.conn.execute(&stmt).await?;
        RepositoryError::expect_rows(ENTITY, 1, affected)?;

        let stmt = Statement::new(
            "UPDATE scheduled_customers SET day_offset = $1 WHERE scheduleid = $2 AND day_offset = $3",
        )
        .bind(day_offset)
        .bind(existing.schedule_id)
        .bind(existing.day_offset);
        // Whatever is booked on the old offset at this point moves along
        let moved = self.conn.execute(&stmt).await?;
        tracing::debug!(day_id = %id, moved, "moved scheduled customers with their day");

        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// Delete a day after deleting each scheduled customer on it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the day does not exist.
    pub async fn delete(&mut self, id: ScheduleDayId) -> Result<(), RepositoryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        let visits = ScheduledCustomerRepository::new(&mut *self.conn)
            .query_for_day(existing.schedule_id, existing.day_offset)
            .await?;
        for visit in visits {
            ScheduledCustomerRepository::new(&mut *self.conn)
                .delete(visit.id)
                .await?;
        }

        let stmt = Statement::new("DELETE FROM schedule_days WHERE scheduledayid = $1").bind(id);
        let affected = self.conn.execute(&stmt).await?;
        RepositoryError::expect_rows(ENTITY, 1, affected)
    }
}
