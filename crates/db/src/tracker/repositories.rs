use async_trait::async_trait;

use syncline_common::error::SynclineResult;

use crate::tracker::models::{
    Changelog, Component, FixVersion, Issue, IssueComment, IssueFixVersion, IssueLabel, Project,
    Status, Subtask, TrackerUser,
};

/// Write side for tracker entities. Each call persists one entity-type batch
/// as a single transaction; callers own the save order.
#[async_trait]
pub trait TrackerSink: Send + Sync {
    async fn save_users(&self, users: &[TrackerUser]) -> SynclineResult<()>;

    /// Merge-upsert projects fetched from the scope listing.
    async fn save_projects(&self, projects: &[Project]) -> SynclineResult<()>;

    /// Insert-if-absent for projects extracted from issue payloads, so a
    /// key-derived placeholder never clobbers a previously saved real project.
    async fn save_project_stubs(&self, projects: &[Project]) -> SynclineResult<()>;

    async fn save_statuses(&self, statuses: &[Status]) -> SynclineResult<()>;
    async fn save_fix_versions(&self, fix_versions: &[FixVersion]) -> SynclineResult<()>;
    async fn save_issues(&self, issues: &[Issue]) -> SynclineResult<()>;
    async fn save_components(&self, components: &[Component]) -> SynclineResult<()>;

    /// Full-replace labels for the given issues (delete-then-insert).
    async fn replace_labels(
        &self,
        issue_ids: &[String],
        labels: &[IssueLabel],
    ) -> SynclineResult<()>;

    async fn save_issue_fix_versions(&self, links: &[IssueFixVersion]) -> SynclineResult<()>;
    async fn save_subtasks(&self, subtasks: &[Subtask]) -> SynclineResult<()>;
    async fn save_changelogs(&self, changelogs: &[Changelog]) -> SynclineResult<()>;
    async fn save_comments(&self, comments: &[IssueComment]) -> SynclineResult<()>;
}
