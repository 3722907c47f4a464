//! Per-request unit of work with cancellation.
//!
//! A [`RequestScope`] owns one [`LazyTx`] and one [`Cancellation`]. Handler
//! work runs inside [`RequestScope::run`], which decides the fate of the
//! transaction from how the work ended:
//!
//! | outcome                 | transaction | result                   |
//! |-------------------------|-------------|--------------------------|
//! | `Ok(value)`             | commit      | `Ok(value)` or `CommitFailed` |
//! | `Err(error)`            | rollback    | `Err(error)`             |
//! | panic                   | rollback    | `Internal`               |
//! | deadline or shutdown    | rollback    | `Cancelled`              |
//!
//! Work that never writes never begins a transaction, so every arm above is
//! free for read-only requests.

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::executor::Pool;
use super::lazy_tx::LazyTx;
use crate::error::AppError;
use crate::state::AppState;

/// Signals that in-flight work should stop.
///
/// Fires when the deadline passes or the shutdown flag flips to `true`,
/// whichever comes first.
#[derive(Debug)]
pub struct Cancellation {
    shutdown: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Cancellation driven by a shutdown flag and an optional timeout
    /// measured from now.
    #[must_use]
    pub fn new(shutdown: Option<watch::Receiver<bool>>, timeout: Option<Duration>) -> Self {
        Self {
            shutdown,
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        }
    }

    /// Cancellation that never fires. Used by one-shot CLI commands.
    #[must_use]
    pub const fn never() -> Self {
        Self {
            shutdown: None,
            deadline: None,
        }
    }

    /// Resolves once the work should be abandoned.
    pub async fn cancelled(&mut self) {
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        let shutdown = async {
            let Some(rx) = self.shutdown.as_mut() else {
                return std::future::pending().await;
            };
            let closed = rx.wait_for(|stopping| *stopping).await.is_err();
            if closed {
                // Sender dropped without signalling; nothing will ever fire
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            () = expired => debug!("request deadline reached"),
            () = shutdown => debug!("shutdown requested"),
        }
    }
}

/// One request's unit of work.
pub struct RequestScope<P: Pool = PgPool> {
    tx: LazyTx<P>,
    cancel: Cancellation,
}

impl<P: Pool> RequestScope<P> {
    #[must_use]
    pub const fn new(pool: P, cancel: Cancellation) -> Self {
        Self {
            tx: LazyTx::new(pool),
            cancel,
        }
    }

    /// Run `work` against the unit of work and settle the transaction.
    ///
    /// # Errors
    ///
    /// Returns the work's own error, `AppError::Cancelled` if the deadline or
    /// shutdown fired first, `AppError::Internal` if the work panicked, or
    /// `AppError::CommitFailed` if the work succeeded but `COMMIT` did not.
    pub async fn run<T, F>(self, work: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut LazyTx<P>) -> BoxFuture<'a, Result<T, AppError>>,
    {
        let Self { mut tx, mut cancel } = self;

        let outcome = {
            let work = AssertUnwindSafe(work(&mut tx)).catch_unwind();
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                finished = work => Some(finished),
            }
        };

        match outcome {
            None => {
                warn!(started = tx.is_started(), "unit of work cancelled");
                rollback_quietly(&mut tx).await;
                Err(AppError::Cancelled)
            }
            Some(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "unit of work panicked");
                rollback_quietly(&mut tx).await;
                Err(AppError::Internal(format!("handler panicked: {message}")))
            }
            Some(Ok(Err(err))) => {
                if err.is_fault() {
                    warn!(error = %err, "unit of work failed");
                } else {
                    debug!(error = %err, "unit of work rejected");
                }
                rollback_quietly(&mut tx).await;
                Err(err)
            }
            Some(Ok(Ok(value))) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(err) => {
                    error!(error = %err, "commit failed");
                    Err(AppError::CommitFailed(err))
                }
            },
        }
    }
}

impl FromRequestParts<AppState> for RequestScope<PgPool> {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.request_scope())
    }
}

async fn rollback_quietly<P: Pool>(tx: &mut LazyTx<P>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "rollback failed");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::filter::Statement;
    use crate::db::testing::RecordingPool;
    use crate::db::{RepositoryError, WriteExecutor};

    fn insert() -> Statement {
        Statement::new("INSERT INTO schedules (userid, start_day) VALUES ($1, $2)")
    }

    fn delete() -> Statement {
        Statement::new("DELETE FROM schedule_days WHERE scheduleid = $1")
    }

    #[tokio::test]
    async fn test_success_commits_once() {
        let pool = RecordingPool::new();
        let scope = RequestScope::new(pool.clone(), Cancellation::never());

        let value = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    Ok(7)
                })
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        let journal = pool.journal();
        assert_eq!(journal.begins, 1);
        assert_eq!(journal.commits, 1);
        assert_eq!(journal.rollbacks, 0);
        assert_eq!(journal.committed.len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_work_never_begins() {
        let pool = RecordingPool::new();
        let scope = RequestScope::new(pool.clone(), Cancellation::never());

        let result: Result<(), AppError> = scope.run(|_tx| Box::pin(async { Ok(()) })).await;

        assert!(result.is_ok());
        let journal = pool.journal();
        assert_eq!(journal.begins, 0);
        assert_eq!(journal.commits, 0);
    }

    #[tokio::test]
    async fn test_fault_rolls_back_earlier_writes() {
        let pool = RecordingPool::failing_on("DELETE");
        let scope = RequestScope::new(pool.clone(), Cancellation::never());

        let result: Result<(), AppError> = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    tx.execute(&delete()).await.map_err(RepositoryError::from)?;
                    Ok(())
                })
            })
            .await;

        assert!(result.unwrap_err().is_fault());
        let journal = pool.journal();
        assert_eq!(journal.rollbacks, 1);
        assert_eq!(journal.commits, 0);
        assert!(journal.committed.is_empty());
    }

    #[tokio::test]
    async fn test_domain_error_rolls_back() {
        let pool = RecordingPool::new();
        let scope = RequestScope::new(pool.clone(), Cancellation::never());

        let result: Result<(), AppError> = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    Err(RepositoryError::AlreadyExists("schedule day").into())
                })
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Repository(RepositoryError::AlreadyExists(_)))
        ));
        let journal = pool.journal();
        assert_eq!(journal.rollbacks, 1);
        assert!(journal.committed.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_mid_work_rolls_back() {
        let pool = RecordingPool::new();
        let (stop, rx) = watch::channel(false);
        let scope = RequestScope::new(pool.clone(), Cancellation::new(Some(rx), None));

        let result: Result<(), AppError> = scope
            .run(move |tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    stop.send_replace(true);
                    std::future::pending::<()>().await;
                    Ok(())
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        let journal = pool.journal();
        assert_eq!(journal.begins, 1);
        assert_eq!(journal.rollbacks, 1);
        assert_eq!(journal.commits, 0);
    }

    #[tokio::test]
    async fn test_deadline_rolls_back() {
        let pool = RecordingPool::new();
        let cancel = Cancellation::new(None, Some(Duration::from_millis(20)));
        let scope = RequestScope::new(pool.clone(), cancel);

        let result: Result<(), AppError> = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(pool.journal().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_cancels_without_io() {
        let pool = RecordingPool::new();
        let (stop, rx) = watch::channel(true);
        let scope = RequestScope::new(pool.clone(), Cancellation::new(Some(rx), None));

        let result: Result<(), AppError> = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    Ok(())
                })
            })
            .await;

        drop(stop);
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(pool.journal().begins, 0);
    }

    #[tokio::test]
    async fn test_panic_rolls_back_and_reports_internal() {
        let pool = RecordingPool::new();
        let scope = RequestScope::new(pool.clone(), Cancellation::never());

        let result: Result<(), AppError> = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    panic!("boom");
                })
            })
            .await;

        match result {
            Err(AppError::Internal(message)) => assert!(message.contains("boom")),
            other => panic!("expected internal error, got {other:?}"),
        }
        let journal = pool.journal();
        assert_eq!(journal.rollbacks, 1);
        assert_eq!(journal.commits, 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let pool = RecordingPool::failing_commit();
        let scope = RequestScope::new(pool.clone(), Cancellation::never());

        let result: Result<(), AppError> = scope
            .run(|tx| {
                Box::pin(async move {
                    tx.execute(&insert()).await.map_err(RepositoryError::from)?;
                    Ok(())
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::CommitFailed(_))));
        assert!(pool.journal().committed.is_empty());
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("borrowed");
        let other: Box<dyn std::any::Any + Send> = Box::new(3_u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
