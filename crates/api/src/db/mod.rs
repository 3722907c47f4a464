//! Transactional data access for Postgres.
//!
//! # Tables
//!
//! - `users` - accounts, unique by normalized email
//! - `schedules` - one week of work per user and start day
//! - `schedule_days` - working days within a schedule (offset 0-6)
//! - `scheduled_customers` - customer visits on a schedule day
//!
//! Foreign keys exist but nothing cascades in the database. Deleting a
//! parent walks its children in application code, inside the same unit of
//! work, so either the whole tree goes or nothing does.
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and are applied with
//! ```bash
//! cargo run -p prime-shine-cli -- migrate
//! ```

pub mod executor;
pub mod filter;
pub mod lazy_tx;
pub mod schedule_days;
pub mod scheduled_customers;
pub mod schedules;
pub mod scope;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use executor::{Pool, ReadExecutor, Record, TransactionHandle, WriteExecutor};
pub use filter::{Filter, SqlValue, Statement};
pub use lazy_tx::LazyTx;
pub use schedule_days::ScheduleDayRepository;
pub use scheduled_customers::ScheduledCustomerRepository;
pub use schedules::ScheduleRepository;
pub use scope::{Cancellation, RequestScope};
pub use users::UserRepository;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
///
/// The first four variants are domain outcomes the caller can act on; the
/// rest are faults. See [`RepositoryError::is_fault`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An entity with the same business key already exists.
    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A mutating statement touched an unexpected number of rows.
    #[error("{entity} was not updated: expected {expected} row(s), affected {actual}")]
    NotMutated {
        entity: &'static str,
        expected: u64,
        actual: u64,
    },

    /// Input rejected before touching the database.
    #[error("{0}")]
    InvalidInput(String),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A lookup was built without any condition.
    #[error("refusing to query with an empty filter")]
    EmptyFilter,
}

impl RepositoryError {
    /// Whether this is an infrastructure fault rather than a domain outcome.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Database(_) | Self::EmptyFilter)
    }

    /// Map a unique violation on insert/update to `AlreadyExists`.
    pub(crate) fn from_write(entity: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return Self::AlreadyExists(entity);
            }
            Self::Database(e)
        }
    }

    /// Check a rows-affected count against the expected value.
    pub(crate) fn expect_rows(
        entity: &'static str,
        expected: u64,
        actual: u64,
    ) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::NotMutated {
                entity,
                expected,
                actual,
            })
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
