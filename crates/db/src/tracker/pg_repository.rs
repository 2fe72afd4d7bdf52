use async_trait::async_trait;
use sqlx::PgPool;

use syncline_common::error::SynclineResult;

use crate::tracker::models::{
    Changelog, Component, FixVersion, Issue, IssueComment, IssueFixVersion, IssueLabel, Project,
    Status, Subtask, TrackerUser,
};
use crate::tracker::repositories::TrackerSink;
use crate::upsert::{insert_batch_if_absent, replace_children, upsert_batch};

#[derive(Clone)]
pub struct PgTrackerRepository {
    pool: PgPool,
}

impl PgTrackerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackerSink for PgTrackerRepository {
    async fn save_users(&self, users: &[TrackerUser]) -> SynclineResult<()> {
        upsert_batch(&self.pool, users).await
    }

    async fn save_projects(&self, projects: &[Project]) -> SynclineResult<()> {
        upsert_batch(&self.pool, projects).await
    }

    async fn save_project_stubs(&self, projects: &[Project]) -> SynclineResult<()> {
        insert_batch_if_absent(&self.pool, projects).await
    }

    async fn save_statuses(&self, statuses: &[Status]) -> SynclineResult<()> {
        upsert_batch(&self.pool, statuses).await
    }

    async fn save_fix_versions(&self, fix_versions: &[FixVersion]) -> SynclineResult<()> {
        upsert_batch(&self.pool, fix_versions).await
    }

    async fn save_issues(&self, issues: &[Issue]) -> SynclineResult<()> {
        upsert_batch(&self.pool, issues).await
    }

    async fn save_components(&self, components: &[Component]) -> SynclineResult<()> {
        upsert_batch(&self.pool, components).await
    }

    async fn replace_labels(
        &self,
        issue_ids: &[String],
        labels: &[IssueLabel],
    ) -> SynclineResult<()> {
        replace_children(&self.pool, "issue_id", issue_ids, labels).await
    }

    async fn save_issue_fix_versions(&self, links: &[IssueFixVersion]) -> SynclineResult<()> {
        upsert_batch(&self.pool, links).await
    }

    async fn save_subtasks(&self, subtasks: &[Subtask]) -> SynclineResult<()> {
        upsert_batch(&self.pool, subtasks).await
    }

    async fn save_changelogs(&self, changelogs: &[Changelog]) -> SynclineResult<()> {
        upsert_batch(&self.pool, changelogs).await
    }

    async fn save_comments(&self, comments: &[IssueComment]) -> SynclineResult<()> {
        upsert_batch(&self.pool, comments).await
    }
}
