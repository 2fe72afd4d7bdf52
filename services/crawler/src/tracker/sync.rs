use std::time::Duration;

use syncline_common::error::SynclineResult;
use syncline_db::tracker::models::Project;
use syncline_db::tracker::repositories::TrackerSink;

use crate::walker::{CrawlProgress, Walker};

use super::mapper::{self, IssueBundle, TrackerBatch};
use super::source::TrackerSource;

/// One full crawl over the tracker: every project scope, every issue page,
/// every issue's detail record. Scope failures abort the scope, record
/// failures abort the record; both are recorded and the crawl continues.
pub struct TrackerCrawl<'a, S: TrackerSink> {
    source: TrackerSource<'a>,
    sink: &'a S,
    walker: Walker,
    include_archived: bool,
    batch_size: usize,
    record_delay: Duration,
}

impl<'a, S> TrackerCrawl<'a, S>
where
    S: TrackerSink,
{
    pub fn new(
        source: TrackerSource<'a>,
        sink: &'a S,
        walker: Walker,
        include_archived: bool,
        record_delay: Duration,
    ) -> Self {
        let batch_size = walker.page_size.max(1);
        Self {
            source,
            sink,
            walker,
            include_archived,
            batch_size,
            record_delay,
        }
    }

    pub async fn run(&self, progress: &mut CrawlProgress) -> SynclineResult<()> {
        // A scope listing that cannot be fetched at all fails the crawl.
        let raw_projects = self.source.list_projects(self.include_archived).await?;
        let projects: Vec<Project> = raw_projects.iter().map(mapper::map_project).collect();
        self.sink.save_projects(&projects).await?;

        progress.total_scopes = projects.len();
        tracing::info!(count = projects.len(), "fetched tracker projects");

        for project in &projects {
            progress.current_scope = Some(project.key.clone());

            let issues = match self.walker.collect_scope(&self.source, &project.key).await {
                Ok(issues) => issues,
                Err(e) => {
                    progress.record_error(format!("project {}: {e}", project.key));
                    continue;
                }
            };

            progress.total_items += issues.len();
            tracing::info!(project = %project.key, count = issues.len(), "fetched issues");

            for chunk in issues.chunks(self.batch_size) {
                let mut bundles: Vec<IssueBundle> = Vec::with_capacity(chunk.len());

                for issue in chunk {
                    let Some(key) = issue.key().or(issue.id()).map(str::to_owned) else {
                        progress.record_error(format!(
                            "project {}: issue without id or key",
                            project.key
                        ));
                        continue;
                    };
                    progress.current_item = Some(key.clone());

                    match self.load_bundle(&key).await {
                        Ok(bundle) => bundles.push(bundle),
                        Err(e) => progress.record_error(format!("issue {key}: {e}")),
                    }

                    if !self.record_delay.is_zero() {
                        tokio::time::sleep(self.record_delay).await;
                    }
                }

                let completed = bundles.len();
                let batch = mapper::collect_batch(bundles);
                match self.persist_batch(&batch).await {
                    Ok(()) => progress.completed_items += completed,
                    Err(e) => {
                        progress.record_error(format!("project {} batch: {e}", project.key))
                    }
                }
            }

            progress.completed_scopes += 1;
        }

        Ok(())
    }

    async fn load_bundle(&self, issue_key: &str) -> SynclineResult<IssueBundle> {
        let detail = self.source.issue_detail(issue_key).await?;

        let comments = match self.source.issue_comments(issue_key, 1000).await {
            Ok(comments) => comments,
            Err(e) => {
                tracing::warn!(issue = issue_key, error = %e, "comment fetch failed");
                Vec::new()
            }
        };

        mapper::extract_bundle(&detail, &comments)
    }

    /// Persist one batch stage by stage in dependency order. Each stage is
    /// one transaction; a failing stage aborts the rest of the batch and the
    /// already-committed stages stand.
    async fn persist_batch(&self, batch: &TrackerBatch) -> SynclineResult<()> {
        self.sink.save_users(&batch.users).await?;
        self.sink.save_project_stubs(&batch.projects).await?;
        self.sink.save_statuses(&batch.statuses).await?;
        self.sink.save_fix_versions(&batch.fix_versions).await?;
        self.sink.save_issues(&batch.issues).await?;
        self.sink.save_components(&batch.components).await?;

        let issue_ids: Vec<String> = batch.issues.iter().map(|i| i.id.clone()).collect();
        self.sink.replace_labels(&issue_ids, &batch.labels).await?;

        self.sink
            .save_issue_fix_versions(&batch.issue_fix_versions)
            .await?;
        self.sink.save_subtasks(&batch.subtasks).await?;
        self.sink.save_changelogs(&batch.changelogs).await?;
        self.sink.save_comments(&batch.comments).await?;
        Ok(())
    }
}
