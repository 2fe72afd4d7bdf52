use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use syncline_common::error::{SynclineError, SynclineResult};

use crate::upsert::{replace_children, surrogate_ids, upsert_batch};
use crate::wiki::models::{
    Contributor, Page, Space, View, VisitHistory, WikiComment, WikiLabel, WikiUser,
};
use crate::wiki::repositories::WikiSink;

#[derive(Clone)]
pub struct PgWikiRepository {
    pool: PgPool,
}

impl PgWikiRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WikiSink for PgWikiRepository {
    async fn save_users(&self, users: &[WikiUser]) -> SynclineResult<()> {
        upsert_batch(&self.pool, users).await
    }

    async fn save_spaces(&self, spaces: &[Space]) -> SynclineResult<()> {
        upsert_batch(&self.pool, spaces).await
    }

    async fn save_pages(&self, pages: &[Page]) -> SynclineResult<()> {
        upsert_batch(&self.pool, pages).await
    }

    async fn save_views(&self, views: &[View]) -> SynclineResult<()> {
        upsert_batch(&self.pool, views).await
    }

    async fn save_contributors(&self, contributors: &[Contributor]) -> SynclineResult<()> {
        upsert_batch(&self.pool, contributors).await
    }

    async fn save_visit_histories(&self, visits: &[VisitHistory]) -> SynclineResult<()> {
        upsert_batch(&self.pool, visits).await
    }

    async fn replace_labels(
        &self,
        page_ids: &[String],
        labels: &[WikiLabel],
    ) -> SynclineResult<()> {
        replace_children(&self.pool, "page_id", page_ids, labels).await
    }

    async fn save_comments(&self, comments: &[WikiComment]) -> SynclineResult<()> {
        upsert_batch(&self.pool, comments).await
    }

    async fn user_ids_by_keys(&self, keys: &[String]) -> SynclineResult<HashMap<String, i64>> {
        surrogate_ids(&self.pool, "wiki_users", "user_key", keys, true).await
    }

    async fn view_ids_for_page(&self, page_id: &str) -> SynclineResult<HashMap<String, i64>> {
        let rows =
            sqlx::query("select id, lower(user_key) as user_key from wiki_views where page_id = $1")
                .bind(page_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| SynclineError::Database(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("user_key"), r.get::<i64, _>("id")))
            .collect())
    }

    async fn contributor_count(&self, page_id: &str) -> SynclineResult<i64> {
        let row = sqlx::query("select count(*) as cnt from wiki_contributors where page_id = $1")
            .bind(page_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SynclineError::Database(e.to_string()))?;
        Ok(row.get::<i64, _>("cnt"))
    }
}
