use sqlx::PgPool;

use syncline_common::error::{SynclineError, SynclineResult};

use crate::report::models::CrawlRun;

#[derive(Clone)]
pub struct PgCrawlRunRepository {
    pool: PgPool,
}

impl PgCrawlRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, run: &CrawlRun) -> SynclineResult<()> {
        sqlx::query(
            "insert into crawl_runs
             (id, source, scopes_total, scopes_completed, items_total, items_completed,
              error_count, errors, started_at, finished_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(run.id)
        .bind(&run.source)
        .bind(run.scopes_total)
        .bind(run.scopes_completed)
        .bind(run.items_total)
        .bind(run.items_completed)
        .bind(run.error_count)
        .bind(&run.errors)
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SynclineError::Database(e.to_string()))?;
        Ok(())
    }
}
