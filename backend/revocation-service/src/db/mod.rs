pub mod tokens;

pub use tokens::{PgTokenLedger, TokenLedger};

use crate::config::DatabaseSettings;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Build the Postgres pool for the ledger
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await
        .context("failed to connect to Postgres")
}
