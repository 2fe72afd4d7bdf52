use std::collections::HashMap;

use async_trait::async_trait;

use syncline_common::error::SynclineResult;

use crate::wiki::models::{
    Contributor, Page, Space, View, VisitHistory, WikiComment, WikiLabel, WikiUser,
};

/// Write side for wiki entities plus the surrogate-id lookups the assembler
/// needs. Each save persists one entity-type batch as a single transaction;
/// callers own the save order (users before pages, views before visit
/// histories).
#[async_trait]
pub trait WikiSink: Send + Sync {
    async fn save_users(&self, users: &[WikiUser]) -> SynclineResult<()>;
    async fn save_spaces(&self, spaces: &[Space]) -> SynclineResult<()>;
    async fn save_pages(&self, pages: &[Page]) -> SynclineResult<()>;
    async fn save_views(&self, views: &[View]) -> SynclineResult<()>;
    async fn save_contributors(&self, contributors: &[Contributor]) -> SynclineResult<()>;
    async fn save_visit_histories(&self, visits: &[VisitHistory]) -> SynclineResult<()>;

    /// Full-replace labels for the given pages (delete-then-insert).
    async fn replace_labels(&self, page_ids: &[String], labels: &[WikiLabel])
        -> SynclineResult<()>;

    async fn save_comments(&self, comments: &[WikiComment]) -> SynclineResult<()>;

    /// Surrogate ids of persisted users, keyed by lowercased user key.
    async fn user_ids_by_keys(&self, keys: &[String]) -> SynclineResult<HashMap<String, i64>>;

    /// Surrogate ids of persisted View rows for one page, keyed by lowercased
    /// user key.
    async fn view_ids_for_page(&self, page_id: &str) -> SynclineResult<HashMap<String, i64>>;

    /// Existing contributor rows for one page, compared against the page's
    /// version count to detect already-synced pages.
    async fn contributor_count(&self, page_id: &str) -> SynclineResult<i64>;
}
