//! CLI subcommands.

pub mod migrate;
pub mod user;

use prime_shine_api::config::{ConfigError, database_url_from};
use prime_shine_api::db;
use sqlx::PgPool;

/// Connect using `DATABASE_URL` or the `POSTGRES_*` parts.
///
/// Unlike the server, commands don't need a signing secret, so only the
/// database settings are read.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from(|key| std::env::var(key).ok())?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
