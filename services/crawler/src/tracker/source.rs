use async_trait::async_trait;
use serde_json::json;

use syncline_common::error::{SynclineError, SynclineResult};

use crate::mcp::McpSession;
use crate::walker::PagedSource;

use super::models::{RawIssue, RawIssueComment, RawIssuePage, RawProject};

/// Typed facade over the tracker tool family of one MCP session.
pub struct TrackerSource<'a> {
    session: &'a McpSession,
}

impl<'a> TrackerSource<'a> {
    pub fn new(session: &'a McpSession) -> Self {
        Self { session }
    }

    pub async fn list_projects(&self, include_archived: bool) -> SynclineResult<Vec<RawProject>> {
        let value = self
            .session
            .call_tool(
                "jira_get_all_projects",
                json!({ "include_archived": include_archived }),
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("project list decode: {e}")))
    }

    /// Full issue record including the changelog expansion.
    pub async fn issue_detail(&self, issue_key: &str) -> SynclineResult<RawIssue> {
        let value = self
            .session
            .call_tool(
                "jira_get_issue",
                json!({
                    "issue_key": issue_key,
                    "fields": "*all",
                    "expand": "changelog"
                }),
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("issue {issue_key} decode: {e}")))
    }

    pub async fn issue_comments(
        &self,
        issue_key: &str,
        limit: usize,
    ) -> SynclineResult<Vec<RawIssueComment>> {
        let value = self
            .session
            .call_tool(
                "jira_get_issue_comments",
                json!({ "issue_key": issue_key, "limit": limit }),
            )
            .await?;

        // Some deployments answer with a bare message instead of a list
        if !value.is_array() {
            return Ok(Vec::new());
        }
        serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("comments for {issue_key} decode: {e}")))
    }
}

#[async_trait]
impl PagedSource for TrackerSource<'_> {
    type Item = RawIssue;

    async fn fetch_page(
        &self,
        scope: &str,
        limit: usize,
        offset: usize,
    ) -> SynclineResult<Vec<RawIssue>> {
        let value = self
            .session
            .call_tool(
                "jira_get_project_issues",
                json!({
                    "project_key": scope,
                    "limit": limit,
                    "start_at": offset
                }),
            )
            .await?;

        let page: RawIssuePage = serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("issue page decode: {e}")))?;
        Ok(page.issues)
    }
}
