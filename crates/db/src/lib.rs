pub mod report;
pub mod tracker;
pub mod upsert;
pub mod wiki;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use syncline_common::error::{SynclineError, SynclineResult};

/// Create a Postgres connection pool from a database URL.
///
/// Every save operation checks out one exclusive connection for its
/// transaction, so acquisition is bounded rather than waiting forever on an
/// exhausted pool.
pub async fn create_pool(database_url: &str) -> SynclineResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))
}
