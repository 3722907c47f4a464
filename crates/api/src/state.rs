//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::watch;

use crate::config::ApiConfig;
use crate::db::{Cancellation, RequestScope};
use crate::services::token::TokenService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenService,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let tokens = TokenService::new(config.jwt_secret.clone());
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                shutdown,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Subscribe to the server-wide shutdown signal.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Signal every in-flight unit of work to stop and roll back.
    pub fn trigger_shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// A fresh unit of work bound to the request deadline and shutdown.
    #[must_use]
    pub fn request_scope(&self) -> RequestScope<PgPool> {
        let cancel = Cancellation::new(
            Some(self.shutdown_receiver()),
            Some(self.inner.config.request_timeout),
        );
        RequestScope::new(self.inner.pool.clone(), cancel)
    }
}
