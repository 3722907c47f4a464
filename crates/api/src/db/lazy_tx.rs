//! Lazily started unit of work.
//!
//! A [`LazyTx`] stands in for a transaction that may never be needed. Reads
//! go straight to the pool until the first write, which issues `BEGIN`;
//! from then on every read and write runs on that one transaction so later
//! steps see earlier ones. A request that only validates and reads never
//! holds a transaction at all.
//!
//! `commit` and `rollback` take the transaction out of the unit of work, so
//! whichever runs first finishes it and any later call is a no-op.

use sqlx::PgPool;
use tracing::{debug, warn};

use super::executor::{Pool, ReadExecutor, Record, TransactionHandle, WriteExecutor};
use super::filter::Statement;

/// Unit of work that defers `BEGIN` until the first write.
pub struct LazyTx<P: Pool = PgPool> {
    pool: P,
    tx: Option<P::Transaction>,
}

impl<P: Pool> LazyTx<P> {
    #[must_use]
    pub const fn new(pool: P) -> Self {
        Self { pool, tx: None }
    }

    /// Whether a transaction has been opened and not yet finished.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.tx.is_some()
    }

    /// The pool reads fall back to before the transaction starts.
    #[must_use]
    pub const fn pool(&self) -> &P {
        &self.pool
    }

    /// Commit if a transaction was started; otherwise do nothing.
    ///
    /// # Errors
    ///
    /// Returns the database error if `COMMIT` fails. The transaction is
    /// consumed either way.
    pub async fn commit(&mut self) -> Result<(), sqlx::Error> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        tx.commit().await?;
        debug!("unit of work committed");
        Ok(())
    }

    /// Roll back if a transaction was started; otherwise do nothing.
    ///
    /// # Errors
    ///
    /// Returns the database error if `ROLLBACK` fails. The transaction is
    /// consumed either way.
    pub async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        tx.rollback().await?;
        debug!("unit of work rolled back");
        Ok(())
    }

    async fn transaction(&mut self) -> Result<&mut P::Transaction, sqlx::Error> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                let tx = self.pool.begin().await?;
                debug!("unit of work started");
                tx
            }
        };
        Ok(self.tx.insert(tx))
    }
}

impl<P: Pool> ReadExecutor for LazyTx<P> {
    async fn fetch_optional<T: Record>(
        &mut self,
        stmt: &Statement,
    ) -> Result<Option<T>, sqlx::Error> {
        match self.tx.as_mut() {
            Some(tx) => tx.fetch_optional(stmt).await,
            None => self.pool.fetch_optional(stmt).await,
        }
    }

    async fn fetch_all<T: Record>(&mut self, stmt: &Statement) -> Result<Vec<T>, sqlx::Error> {
        match self.tx.as_mut() {
            Some(tx) => tx.fetch_all(stmt).await,
            None => self.pool.fetch_all(stmt).await,
        }
    }
}

impl<P: Pool> WriteExecutor for LazyTx<P> {
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, sqlx::Error> {
        self.transaction().await?.execute(stmt).await
    }

    async fn insert_returning_id(&mut self, stmt: &Statement) -> Result<Option<i32>, sqlx::Error> {
        self.transaction().await?.insert_returning_id(stmt).await
    }
}

impl<P: Pool> Drop for LazyTx<P> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            // The transaction's own drop issues the rollback
            warn!("unit of work abandoned while open; rolling back");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::testing::RecordingPool;
    use crate::models::User;

    fn insert() -> Statement {
        Statement::new("INSERT INTO users (name) VALUES ($1)").bind("a")
    }

    #[tokio::test]
    async fn test_reads_do_not_begin() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool.clone());

        let found: Option<User> = tx.fetch_optional(&insert()).await.unwrap();
        let all: Vec<User> = tx.fetch_all(&insert()).await.unwrap();

        assert!(found.is_none());
        assert!(all.is_empty());
        assert!(!tx.is_started());
        assert_eq!(pool.journal().begins, 0);
        assert_eq!(pool.journal().pool_reads, 2);
    }

    #[tokio::test]
    async fn test_first_write_begins_once() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool.clone());

        tx.execute(&insert()).await.unwrap();
        tx.insert_returning_id(&insert()).await.unwrap();
        let _: Option<User> = tx.fetch_optional(&insert()).await.unwrap();

        assert!(tx.is_started());
        let journal = pool.journal();
        assert_eq!(journal.begins, 1);
        assert_eq!(journal.pool_reads, 0);
        assert_eq!(journal.tx_reads, 1);
    }

    #[tokio::test]
    async fn test_commit_and_rollback_without_begin_are_noops() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool.clone());

        tx.commit().await.unwrap();
        tx.rollback().await.unwrap();

        let journal = pool.journal();
        assert_eq!(journal.begins, 0);
        assert_eq!(journal.commits, 0);
        assert_eq!(journal.rollbacks, 0);
    }

    #[tokio::test]
    async fn test_commit_happens_once() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool.clone());

        tx.execute(&insert()).await.unwrap();
        tx.commit().await.unwrap();
        tx.commit().await.unwrap();
        tx.rollback().await.unwrap();

        let journal = pool.journal();
        assert_eq!(journal.commits, 1);
        assert_eq!(journal.rollbacks, 0);
        assert_eq!(journal.committed.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let pool = RecordingPool::new();
        let mut tx = LazyTx::new(pool.clone());

        tx.execute(&insert()).await.unwrap();
        tx.rollback().await.unwrap();
        tx.commit().await.unwrap();

        let journal = pool.journal();
        assert_eq!(journal.rollbacks, 1);
        assert_eq!(journal.commits, 0);
        assert!(journal.committed.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_transaction_open() {
        let pool = RecordingPool::failing_on("DELETE");
        let mut tx = LazyTx::new(pool.clone());

        let err = tx
            .execute(&Statement::new("DELETE FROM users"))
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Protocol(_)));
        assert!(tx.is_started());

        tx.rollback().await.unwrap();
        assert_eq!(pool.journal().rollbacks, 1);
    }
}
