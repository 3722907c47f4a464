//! Scheduled customer repository.
//!
//! A visit can only be booked on a day that exists in its schedule, must
//! end after it starts, and the full `(customer, start, end, day, schedule)`
//! tuple is unique.

use chrono::{DateTime, Utc};

use prime_shine_core::{DayOffset, ScheduleId, ScheduledCustomerId};

use super::RepositoryError;
use super::executor::{ReadExecutor, WriteExecutor};
use super::filter::{Filter, Statement};
use super::schedule_days::ScheduleDayRepository;
use crate::models::ScheduledCustomer;

const TABLE: &str = "scheduled_customers";
const COLUMNS: &str =
    "scheduledcustomerid, wave_customerid, start_time, end_time, day_offset, scheduleid";
const ENTITY: &str = "scheduled customer";

/// The fields a caller supplies for a visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub customer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Visit {
    fn validate(&self) -> Result<(), RepositoryError> {
        if self.customer_id.trim().is_empty() {
            return Err(RepositoryError::InvalidInput(
                "customer id cannot be empty".to_owned(),
            ));
        }
        if self.end_time <= self.start_time {
            return Err(RepositoryError::InvalidInput(
                "end time must be after start time".to_owned(),
            ));
        }
        Ok(())
    }

    fn key(&self, day_offset: DayOffset, schedule_id: ScheduleId) -> Filter {
        Filter::new()
            .eq("wave_customerid", self.customer_id.as_str())
            .eq("start_time", self.start_time)
            .eq("end_time", self.end_time)
            .eq("day_offset", day_offset)
            .eq("scheduleid", schedule_id)
    }
}

/// Repository for scheduled customer database operations.
pub struct ScheduledCustomerRepository<'a, E> {
    conn: &'a mut E,
}

impl<'a, E> ScheduledCustomerRepository<'a, E> {
    #[must_use]
    pub const fn new(conn: &'a mut E) -> Self {
        Self { conn }
    }
}

impl<E: ReadExecutor> ScheduledCustomerRepository<'_, E> {
    /// Find the first visit matching every condition in `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::EmptyFilter` for an empty filter and
    /// `RepositoryError::Database` if the query fails.
    pub async fn find_one(
        &mut self,
        filter: Filter,
    ) -> Result<Option<ScheduledCustomer>, RepositoryError> {
        let stmt = Statement::select_one(TABLE, COLUMNS, filter)?;
        Ok(self.conn.fetch_optional(&stmt).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(
        &mut self,
        id: ScheduledCustomerId,
    ) -> Result<Option<ScheduledCustomer>, RepositoryError> {
        self.find_one(Filter::new().eq("scheduledcustomerid", id))
            .await
    }

    /// Every visit in a schedule, by day then start time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn query_many(
        &mut self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<ScheduledCustomer>, RepositoryError> {
        let stmt = Statement::select_many(
            TABLE,
            COLUMNS,
            Filter::new().eq("scheduleid", schedule_id),
            "day_offset, start_time, scheduledcustomerid",
        )?;
        Ok(self.conn.fetch_all(&stmt).await?)
    }

    /// Visits on one day of a schedule, by start time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn query_for_day(
        &mut self,
        schedule_id: ScheduleId,
        day_offset: DayOffset,
    ) -> Result<Vec<ScheduledCustomer>, RepositoryError> {
        let stmt = Statement::select_many(
            TABLE,
            COLUMNS,
            Filter::new()
                .eq("scheduleid", schedule_id)
                .eq("day_offset", day_offset),
            "start_time, scheduledcustomerid",
        )?;
        Ok(self.conn.fetch_all(&stmt).await?)
    }
}

impl<E: WriteExecutor> ScheduledCustomerRepository<'_, E> {
    /// Book a visit on an existing schedule day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidInput` for an empty customer id or a
    /// visit that does not end after it starts, `RepositoryError::NotFound`
    /// if the schedule has no day at `day_offset`, and
    /// `RepositoryError::AlreadyExists` for an identical booking.
    pub async fn create(
        &mut self,
        visit: &Visit,
        day_offset: DayOffset,
        schedule_id: ScheduleId,
    ) -> Result<ScheduledCustomer, RepositoryError> {
        visit.validate()?;

        ScheduleDayRepository::new(&mut *self.conn)
            .find_by_offset(schedule_id, day_offset)
            .await?
            .ok_or(RepositoryError::NotFound("schedule day"))?;

        if self
            .find_one(visit.key(day_offset, schedule_id))
            .await?
            .is_some()
        {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new(
            "INSERT INTO scheduled_customers \
             (wave_customerid, start_time, end_time, day_offset, scheduleid) \
             VALUES ($1, $2, $3, $4, $5) RETURNING scheduledcustomerid",
        )
        .bind(visit.customer_id.as_str())
        .bind(visit.start_time)
        .bind(visit.end_time)
        .bind(day_offset)
        .bind(schedule_id);

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

        self.find_by_id(ScheduledCustomerId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// Change who is visited and when. The visit stays on its day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidInput` for invalid fields,
    /// `RepositoryError::NotFound` if the visit does not exist, and
    /// `RepositoryError::AlreadyExists` if the result would duplicate
    /// another booking.
    pub async fn edit(
        &mut self,
        id: ScheduledCustomerId,
        visit: &Visit,
    ) -> Result<ScheduledCustomer, RepositoryError> {
        visit.validate()?;

        let existing = self
            .find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        if let Some(other) = self
            .find_one(visit.key(existing.day_offset, existing.schedule_id))
            .await?
            && other.id != id
        {
            return Err(RepositoryError::AlreadyExists(ENTITY));
        }

        let stmt = Statement::new(
            "UPDATE scheduled_customers \
             SET wave_customerid = $1, start_time = $2, end_time = $3 \
             WHERE scheduledcustomerid = $4",
        )
        .bind(visit.customer_id.as_str())
        .bind(visit.start_time)
        .bind(visit.end_time)
        .bind(id);
        let affected = self.conn.execute(&stmt).await?;
        RepositoryError::expect_rows(ENTITY, 1, affected)?;

        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the visit does not exist.
    pub async fn delete(&mut self, id: ScheduledCustomerId) -> Result<(), RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound(ENTITY))?;

        let stmt =
            Statement::new("DELETE FROM scheduled_customers WHERE scheduledcustomerid = $1")
                .bind(id);
        let affected = self.conn.execute(&stmt).await?;
        RepositoryError::expect_rows(ENTITY, 1, affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::LazyTx;
    use crate::db::testing::{RecordingPool, day_row, visit_row};

    fn visit(start_hour: u32, end_hour: u32) -> Visit {
        Visit {
            customer_id: "cust-42".to_owned(),
            start_time: Utc.with_ymd_and_hms(2024, 2, 5, start_hour, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 2, 5, end_hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_rejects_inverted_times_without_io() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool.clone());

        let err = ScheduledCustomerRepository::new(&mut tx)
            .create(&visit(11, 9), DayOffset::new(1).unwrap(), ScheduleId::new(1))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidInput(_)));
        assert_eq!(pool.journal().pool_reads, 0);
    }

    #[tokio::test]
    async fn test_rejects_equal_times() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool);

        let err = ScheduledCustomerRepository::new(&mut tx)
            .edit(ScheduledCustomerId::new(1), &visit(9, 9))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "end time must be after start time");
    }

    #[tokio::test]
    async fn test_create_requires_schedule_day() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool.clone());

        let err = ScheduledCustomerRepository::new(&mut tx)
            .create(&visit(9, 10), DayOffset::new(1).unwrap(), ScheduleId::new(1))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound("schedule day")));
        assert_eq!(pool.journal().begins, 0);
    }

    #[tokio::test]
    async fn test_identical_booking_rejected_without_writing() {
        let pool = RecordingPool::new()
            .returning(
                "FROM schedule_days WHERE scheduleid = $1 AND day_offset = $2",
                vec![day_row(2, 1, 1)],
            )
            .returning(
                "FROM scheduled_customers WHERE wave_customerid = $1",
                vec![visit_row(7, 1, 1)],
            );
        let mut tx = LazyTx::new(pool.clone());

        let err = ScheduledCustomerRepository::new(&mut tx)
            .create(&visit(9, 10), DayOffset::new(1).unwrap(), ScheduleId::new(1))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::AlreadyExists("scheduled customer")));
        let journal = pool.journal();
        assert_eq!(journal.pool_reads, 2);
        assert_eq!(journal.begins, 0);
        assert!(journal.writes.is_empty());
    }

    #[test]
    fn test_visit_key_covers_whole_booking() {
        let key = visit(9, 10).key(DayOffset::new(4).unwrap(), ScheduleId::new(8));
        assert_eq!(
            key.where_clause(),
            "wave_customerid = $1 AND start_time = $2 AND end_time = $3 AND day_offset = $4 AND scheduleid = $5"
        );
    }
}
