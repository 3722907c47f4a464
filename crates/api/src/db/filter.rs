//! Equality filters and parameterized statements.
//!
//! Every existence and uniqueness check in the repositories goes through a
//! [`Filter`]: an ordered list of `column = value` conditions joined with
//! `AND`. Column names are `&'static str`, so they can only come from the
//! repository code itself and never from a request body; values are always
//! bound as positional parameters.
//!
//! ```
//! use prime_shine_api::db::filter::{Filter, Statement};
//!
//! let filter = Filter::new().eq("scheduleid", 4).eq("day_offset", 2);
//! assert_eq!(filter.where_clause(), "scheduleid = $1 AND day_offset = $2");
//!
//! let stmt = Statement::select_one("schedule_days", "scheduledayid", filter).unwrap();
//! assert_eq!(
//!     stmt.sql(),
//!     "SELECT scheduledayid FROM schedule_days WHERE scheduleid = $1 AND day_offset = $2 LIMIT 1"
//! );
//! ```

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Arguments as _;
use sqlx::postgres::PgArguments;

use prime_shine_core::{DayOffset, Email, ScheduleDayId, ScheduleId, ScheduledCustomerId, UserId};

use super::RepositoryError;

/// A value bound to a positional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i32),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<&Email> for SqlValue {
    fn from(value: &Email) -> Self {
        Self::Text(value.as_str().to_owned())
    }
}

impl From<DayOffset> for SqlValue {
    fn from(value: DayOffset) -> Self {
        Self::Int(value.as_i32())
    }
}

macro_rules! id_values {
    ($($id:ty),* $(,)?) => {
        $(
            impl From<$id> for SqlValue {
                fn from(value: $id) -> Self {
                    Self::Int(value.as_i32())
                }
            }
        )*
    };
}

id_values!(UserId, ScheduleId, ScheduleDayId, ScheduledCustomerId);

/// Ordered equality conditions, rendered as `col1 = $1 AND col2 = $2 ...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(&'static str, SqlValue)>,
}

impl Filter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Add a `column = value` condition. Conditions keep insertion order.
    #[must_use]
    pub fn eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.conditions.push((column, value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Render the `WHERE` body with placeholders numbered from `$1`.
    #[must_use]
    pub fn where_clause(&self) -> String {
        let mut clause = String::new();
        for (index, (column, _)) in self.conditions.iter().enumerate() {
            if index > 0 {
                clause.push_str(" AND ");
            }
            let _ = write!(clause, "{column} = ${}", index + 1);
        }
        clause
    }

    /// Values in the same order as the placeholders of [`Self::where_clause`].
    #[must_use]
    pub fn into_args(self) -> Vec<SqlValue> {
        self.conditions.into_iter().map(|(_, value)| value).collect()
    }
}

/// SQL text plus its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    args: Vec<SqlValue>,
}

impl Statement {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Append the next positional argument.
    #[must_use]
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// `SELECT <columns> FROM <table> WHERE <filter> LIMIT 1`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::EmptyFilter` if the filter has no conditions.
    pub fn select_one(
        table: &str,
        columns: &str,
        filter: Filter,
    ) -> Result<Self, RepositoryError> {
        if filter.is_empty() {
            return Err(RepositoryError::EmptyFilter);
        }

        Ok(Self {
            sql: format!(
                "SELECT {columns} FROM {table} WHERE {} LIMIT 1",
                filter.where_clause()
            ),
            args: filter.into_args(),
        })
    }

    /// `SELECT <columns> FROM <table> WHERE <filter> ORDER BY <order_by>`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::EmptyFilter` if the filter has no conditions.
    pub fn select_many(
        table: &str,
        columns: &str,
        filter: Filter,
        order_by: &str,
    ) -> Result<Self, RepositoryError> {
        if filter.is_empty() {
            return Err(RepositoryError::EmptyFilter);
        }

        Ok(Self {
            sql: format!(
                "SELECT {columns} FROM {table} WHERE {} ORDER BY {order_by}",
                filter.where_clause()
            ),
            args: filter.into_args(),
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    /// Encode the arguments for binding.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error::Encode` if a value cannot be encoded.
    pub fn arguments(&self) -> Result<PgArguments, sqlx::Error> {
        let mut args = PgArguments::default();
        for value in &self.args {
            let added = match value {
                SqlValue::Int(v) => args.add(*v),
                SqlValue::Text(v) => args.add(v.clone()),
                SqlValue::Date(v) => args.add(*v),
                SqlValue::Timestamp(v) => args.add(*v),
            };
            added.map_err(sqlx::Error::Encode)?;
        }
        Ok(args)
    }
}
