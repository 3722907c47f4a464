//! Read and write capabilities over Postgres.
//!
//! Repository code is written against these traits instead of a concrete
//! connection type. A read-only caller can pass the pool itself; anything
//! that mutates must hold a [`WriteExecutor`], which in practice is a
//! [`LazyTx`](super::LazyTx) or an open transaction.
//!
//! Both capabilities take `&mut self`. A unit of work may need to open its
//! transaction on first use, and an open transaction is a single connection
//! that cannot be shared.

use std::future::Future;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres};

use super::filter::Statement;

/// A row type that can be decoded from a Postgres row.
pub trait Record: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {}

impl<T> Record for T where T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {}

/// Run queries that return rows.
pub trait ReadExecutor: Send {
    /// Fetch at most one row. No matching row is `Ok(None)`, not an error.
    fn fetch_optional<T: Record>(
        &mut self,
        stmt: &Statement,
    ) -> impl Future<Output = Result<Option<T>, sqlx::Error>> + Send;

    /// Fetch every matching row. An empty result is success.
    fn fetch_all<T: Record>(
        &mut self,
        stmt: &Statement,
    ) -> impl Future<Output = Result<Vec<T>, sqlx::Error>> + Send;
}

/// Run statements that mutate. Every write capability can also read.
pub trait WriteExecutor: ReadExecutor {
    /// Run a statement and return the number of rows affected.
    fn execute(&mut self, stmt: &Statement)
    -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    /// Run an `INSERT ... RETURNING <id>` and return the generated key.
    ///
    /// `None` means the insert produced no row.
    fn insert_returning_id(
        &mut self,
        stmt: &Statement,
    ) -> impl Future<Output = Result<Option<i32>, sqlx::Error>> + Send;
}

/// Finish an open transaction.
pub trait TransactionHandle: Send + Sized {
    fn commit(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// A connection source that reads directly and can open transactions.
pub trait Pool: ReadExecutor + Sync {
    type Transaction: WriteExecutor + TransactionHandle;

    /// Issue `BEGIN` on a fresh connection.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, sqlx::Error>> + Send;
}

impl ReadExecutor for PgPool {
    async fn fetch_optional<T: Record>(
        &mut self,
        stmt: &Statement,
    ) -> Result<Option<T>, sqlx::Error> {
        let args = stmt.arguments()?;
        sqlx::query_as_with::<_, T, _>(stmt.sql(), args)
            .fetch_optional(&*self)
            .await
    }

    async fn fetch_all<T: Record>(&mut self, stmt: &Statement) -> Result<Vec<T>, sqlx::Error> {
        let args = stmt.arguments()?;
        sqlx::query_as_with::<_, T, _>(stmt.sql(), args)
            .fetch_all(&*self)
            .await
    }
}

impl Pool for PgPool {
    type Transaction = sqlx::Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }
}

impl ReadExecutor for sqlx::Transaction<'static, Postgres> {
    async fn fetch_optional<T: Record>(
        &mut self,
        stmt: &Statement,
    ) -> Result<Option<T>, sqlx::Error> {
        let args = stmt.arguments()?;
        sqlx::query_as_with::<_, T, _>(stmt.sql(), args)
            .fetch_optional(&mut **self)
            .await
    }

    async fn fetch_all<T: Record>(&mut self, stmt: &Statement) -> Result<Vec<T>, sqlx::Error> {
        let args = stmt.arguments()?;
        sqlx::query_as_with::<_, T, _>(stmt.sql(), args)
            .fetch_all(&mut **self)
            .await
    }
}

impl WriteExecutor for sqlx::Transaction<'static, Postgres> {
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, sqlx::Error> {
        let args = stmt.arguments()?;
        let result = sqlx::query_with(stmt.sql(), args)
            .execute(&mut **self)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_returning_id(&mut self, stmt: &Statement) -> Result<Option<i32>, sqlx::Error> {
        let args = stmt.arguments()?;
        sqlx::query_scalar_with::<_, i32, _>(stmt.sql(), args)
            .fetch_optional(&mut **self)
            .await
    }
}

impl TransactionHandle for sqlx::Transaction<'static, Postgres> {
    async fn commit(self) -> Result<(), sqlx::Error> {
        sqlx::Transaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        sqlx::Transaction::rollback(self).await
    }
}
