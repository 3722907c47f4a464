//! Recording stand-in for a Postgres pool.
//!
//! Reads return whatever rows a test scripted for them (nothing by default),
//! writes affect one row, and every lifecycle event lands in a shared
//! [`Journal`] so tests can assert what reached the database and whether it
//! was committed.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, TimeZone, Utc};
use prime_shine_core::{
    DayOffset, Email, ScheduleDayId, ScheduleId, ScheduledCustomerId, UserId,
};

use super::executor::{Pool, ReadExecutor, Record, TransactionHandle, WriteExecutor};
use super::filter::Statement;
use crate::models::{Schedule, ScheduleDay, ScheduledCustomer, User};

#[derive(Debug, Default)]
pub struct Journal {
    /// `BEGIN` calls.
    pub begins: usize,
    /// Reads served by the pool outside any transaction.
    pub pool_reads: usize,
    /// Reads served inside a transaction.
    pub tx_reads: usize,
    /// Every write attempted, in order, whether or not it succeeded.
    pub writes: Vec<String>,
    /// Statements that reached a committed transaction.
    pub committed: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
}

/// Queued read results, matched by a substring of the SQL.
#[derive(Debug, Default)]
struct Script {
    rows: Vec<(&'static str, VecDeque<Box<dyn Any + Send>>)>,
}

impl Script {
    fn next<T: Record>(&mut self, sql: &str) -> Result<Vec<T>, sqlx::Error> {
        let Some(queue) = self
            .rows
            .iter_mut()
            .find(|(needle, queue)| !queue.is_empty() && sql.contains(*needle))
            .map(|(_, queue)| queue)
        else {
            return Ok(Vec::new());
        };
        let Some(rows) = queue.pop_front() else {
            return Ok(Vec::new());
        };
        rows.downcast::<Vec<T>>().map(|rows| *rows).map_err(|_| {
            sqlx::Error::Protocol(format!("scripted rows for `{sql}` have another type"))
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    needle: &'static str,
    /// Matching writes that succeed before the failing one.
    skip: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPool {
    journal: Arc<Mutex<Journal>>,
    script: Arc<Mutex<Script>>,
    fail_on: Option<Failure>,
    fail_commit: bool,
}

impl RecordingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any write whose SQL contains `needle`.
    pub fn failing_on(needle: &'static str) -> Self {
        Self::failing_on_after(needle, 0)
    }

    /// Let `skip` writes containing `needle` through, then fail the rest.
    pub fn failing_on_after(needle: &'static str, skip: usize) -> Self {
        Self {
            fail_on: Some(Failure { needle, skip }),
            ..Self::default()
        }
    }

    /// Fail every `COMMIT`.
    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }

    /// Queue one result for the next read whose SQL contains `needle`.
    ///
    /// Each call queues one read; `fetch_optional` takes the first row of
    /// it. Once a queue is drained, matching reads return nothing again.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn returning<T: Record>(self, needle: &'static str, rows: Vec<T>) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            let boxed: Box<dyn Any + Send> = Box::new(rows);
            match script.rows.iter_mut().find(|(n, _)| *n == needle) {
                Some((_, queue)) => queue.push_back(boxed),
                None => script.rows.push((needle, VecDeque::from([boxed]))),
            }
        }
        self
    }

    #[allow(clippy::unwrap_used)]
    pub fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    #[allow(clippy::unwrap_used)]
    fn scripted<T: Record>(&self, stmt: &Statement) -> Result<Vec<T>, sqlx::Error> {
        self.script.lock().unwrap().next(stmt.sql())
    }

    fn attempt(&self, stmt: &Statement) -> Result<(), sqlx::Error> {
        let mut journal = self.journal();
        journal.writes.push(stmt.sql().to_owned());
        let Some(failure) = self.fail_on else {
            return Ok(());
        };
        let matched = journal
            .writes
            .iter()
            .filter(|sql| sql.contains(failure.needle))
            .count();
        if stmt.sql().contains(failure.needle) && matched > failure.skip {
            return Err(sqlx::Error::Protocol(format!(
                "injected failure on {}",
                failure.needle
            )));
        }
        Ok(())
    }
}

impl ReadExecutor for RecordingPool {
    async fn fetch_optional<T: Record>(
        &mut self,
        stmt: &Statement,
    ) -> Result<Option<T>, sqlx::Error> {
        self.journal().pool_reads += 1;
        Ok(self.scripted(stmt)?.into_iter().next())
    }

    async fn fetch_all<T: Record>(&mut self, stmt: &Statement) -> Result<Vec<T>, sqlx::Error> {
        self.journal().pool_reads += 1;
        self.scripted(stmt)
    }
}

impl Pool for RecordingPool {
    type Transaction = RecordingTx;

    async fn begin(&self) -> Result<RecordingTx, sqlx::Error> {
        self.journal().begins += 1;
        Ok(RecordingTx {
            pool: self.clone(),
            pending: Vec::new(),
        })
    }
}

#[derive(Debug)]
pub struct RecordingTx {
    pool: RecordingPool,
    pending: Vec<String>,
}

impl ReadExecutor for RecordingTx {
    async fn fetch_optional<T: Record>(
        &mut self,
        stmt: &Statement,
    ) -> Result<Option<T>, sqlx::Error> {
        self.pool.journal().tx_reads += 1;
        Ok(self.pool.scripted(stmt)?.into_iter().next())
    }

    async fn fetch_all<T: Record>(&mut self, stmt: &Statement) -> Result<Vec<T>, sqlx::Error> {
        self.pool.journal().tx_reads += 1;
        self.pool.scripted(stmt)
    }
}

impl WriteExecutor for RecordingTx {
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, sqlx::Error> {
        self.pool.attempt(stmt)?;
        self.pending.push(stmt.sql().to_owned());
        Ok(1)
    }

    async fn insert_returning_id(&mut self, stmt: &Statement) -> Result<Option<i32>, sqlx::Error> {
        self.execute(stmt).await?;
        Ok(Some(1))
    }
}

impl TransactionHandle for RecordingTx {
    async fn commit(self) -> Result<(), sqlx::Error> {
        if self.pool.fail_commit {
            return Err(sqlx::Error::Protocol("injected commit failure".to_owned()));
        }
        let mut journal = self.pool.journal();
        journal.commits += 1;
        journal.committed.extend(self.pending);
        Ok(())
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.pool.journal().rollbacks += 1;
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
pub fn user_row(id: i32, email: &str) -> User {
    User {
        id: UserId::new(id),
        name: "Dana".to_owned(),
        email: Email::parse(email).unwrap(),
        password_hash: "$argon2id$v=19$stored".to_owned(),
    }
}

#[allow(clippy::unwrap_used)]
pub fn schedule_row(id: i32, user_id: i32) -> Schedule {
    Schedule {
        id: ScheduleId::new(id),
        user_id: UserId::new(user_id),
        start_day: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
    }
}

#[allow(clippy::unwrap_used)]
pub fn day_row(id: i32, schedule_id: i32, day_offset: i32) -> ScheduleDay {
    ScheduleDay {
        id: ScheduleDayId::new(id),
        schedule_id: ScheduleId::new(schedule_id),
        day_offset: DayOffset::new(day_offset).unwrap(),
    }
}

#[allow(clippy::unwrap_used)]
pub fn visit_row(id: i32, schedule_id: i32, day_offset: i32) -> ScheduledCustomer {
    ScheduledCustomer {
        id: ScheduledCustomerId::new(id),
        customer_id: format!("cust-{id}"),
        start_time: Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap(),
        day_offset: DayOffset::new(day_offset).unwrap(),
        schedule_id: ScheduleId::new(schedule_id),
    }
}
