use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use syncline_common::error::{SynclineError, SynclineResult};

use crate::mcp::McpSession;
use crate::walker::PagedSource;

use super::models::{
    RawLabel, RawPage, RawPageView, RawSearchHit, RawSearchResult, RawSpace, RawVersionHistory,
    RawViewHistory, RawVisit, RawWikiComment,
};

/// Typed facade over the wiki tool family of one MCP session.
pub struct WikiSource<'a> {
    session: &'a McpSession,
}

impl<'a> WikiSource<'a> {
    pub fn new(session: &'a McpSession) -> Self {
        Self { session }
    }

    /// Distinct spaces, extracted first-seen from a content search. The
    /// dedicated space listing is unreliable on older deployments; the
    /// search path works everywhere.
    pub async fn list_spaces(&self) -> SynclineResult<Vec<RawSpace>> {
        let value = self
            .session
            .call_tool(
                "confluence_search",
                json!({ "query": "type = page", "limit": 50 }),
            )
            .await?;

        let search: RawSearchResult = serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("space search decode: {e}")))?;

        let mut seen = std::collections::HashSet::new();
        let mut spaces = Vec::new();
        for hit in &search.results {
            if let Some(space) = hit.space() {
                if let Some(key) = &space.key {
                    if seen.insert(key.clone()) {
                        spaces.push(space.clone());
                    }
                }
            }
        }
        Ok(spaces)
    }

    pub async fn page_detail(&self, page_id: &str) -> SynclineResult<RawPage> {
        let value = self
            .session
            .call_tool(
                "confluence_get_page",
                json!({
                    "page_id": page_id,
                    "include_metadata": true,
                    "convert_to_markdown": false
                }),
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("page {page_id} decode: {e}")))
    }

    pub async fn page_labels(&self, page_id: &str) -> SynclineResult<Vec<RawLabel>> {
        let value = self
            .session
            .call_tool("confluence_get_labels", json!({ "page_id": page_id }))
            .await?;
        decode_list(value, "labels")
    }

    pub async fn page_comments(&self, page_id: &str) -> SynclineResult<Vec<RawWikiComment>> {
        let value = self
            .session
            .call_tool("confluence_get_comments", json!({ "page_id": page_id }))
            .await?;
        decode_list(value, "comments")
    }

    /// Full version history, oldest first, with the total version count.
    pub async fn page_versions(&self, page_id: &str) -> SynclineResult<RawVersionHistory> {
        let value = self
            .session
            .call_tool(
                "confluence_get_page_versions",
                json!({ "page_id": page_id }),
            )
            .await?;

        // Either a {results, size} envelope or a bare list
        if value.is_array() {
            let results: Vec<_> = serde_json::from_value(value)
                .map_err(|e| SynclineError::Source(format!("versions decode: {e}")))?;
            let size = Some(results.len() as i64);
            return Ok(RawVersionHistory { results, size });
        }
        serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("versions decode: {e}")))
    }

    /// Per-user view aggregates for one page.
    pub async fn page_views(&self, page_id: &str) -> SynclineResult<Vec<RawPageView>> {
        let value = self
            .session
            .call_tool("confluence_get_page_views", json!({ "page_id": page_id }))
            .await?;

        if value.is_array() {
            return decode_list(value, "views");
        }
        let history: RawViewHistory = serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("views decode: {e}")))?;
        Ok(history.results)
    }

    /// Individual visit events for one page, grouped by user key.
    pub async fn page_visits(
        &self,
        page_id: &str,
        user_keys: &[String],
    ) -> SynclineResult<HashMap<String, Vec<RawVisit>>> {
        let value = self
            .session
            .call_tool(
                "confluence_get_visit_history",
                json!({ "page_id": page_id, "user_keys": user_keys }),
            )
            .await?;

        if value.is_null() {
            return Ok(HashMap::new());
        }
        serde_json::from_value(value)
            .map_err(|e| SynclineError::Source(format!("visit history decode: {e}")))
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(
    value: Value,
    what: &str,
) -> SynclineResult<Vec<T>> {
    if !value.is_array() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(|e| SynclineError::Source(format!("{what} decode: {e}")))
}

#[async_trait]
impl PagedSource for WikiSource<'_> {
    type Item = RawPage;

    async fn fetch_page(
        &self,
        scope: &str,
        limit: usize,
        offset: usize,
    ) -> SynclineResult<Vec<RawPage>> {
        let value = self
            .session
            .call_tool(
                "confluence_get_all_pages_from_space",
                json!({
                    "space_key": scope,
                    "limit": limit,
                    "start": offset
                }),
            )
            .await?;

        let hits: Vec<RawSearchHit> = if value.is_array() {
            serde_json::from_value(value)
                .map_err(|e| SynclineError::Source(format!("page listing decode: {e}")))?
        } else {
            let search: RawSearchResult = serde_json::from_value(value)
                .map_err(|e| SynclineError::Source(format!("page listing decode: {e}")))?;
            search.results
        };

        Ok(hits.into_iter().map(RawSearchHit::into_page).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{McpConfig, McpSession};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn session(server: &MockServer) -> McpSession {
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(serde_json::json!({"method": "initialize"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {}}))
                    .insert_header("Mcp-Session-Id", "sid"),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(
                serde_json::json!({"method": "notifications/initialized"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(server)
            .await;

        McpSession::connect(&McpConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        })
        .await
        .expect("session should connect")
    }

    fn tool_response(payload: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "content": [ { "type": "text", "text": payload.to_string() } ]
            }
        }))
    }

    #[tokio::test]
    async fn list_spaces_dedups_by_key() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(
                serde_json::json!({"params": {"name": "confluence_search"}}),
            ))
            .respond_with(tool_response(serde_json::json!({
                "results": [
                    { "content": { "id": "1" }, "space": { "id": 5, "key": "DOCS", "name": "Docs" } },
                    { "content": { "id": "2" }, "space": { "id": 5, "key": "DOCS", "name": "Docs again" } },
                    { "content": { "id": "3", "space": { "id": 6, "key": "OPS", "name": "Ops" } } }
                ]
            })))
            .mount(&server)
            .await;

        let source = WikiSource::new(&session);
        let spaces = source.list_spaces().await.unwrap();
        assert_eq!(spaces.len(), 2);
        assert_eq!(spaces[0].key.as_deref(), Some("DOCS"));
        assert_eq!(spaces[0].name.as_deref(), Some("Docs"));
        assert_eq!(spaces[1].key.as_deref(), Some("OPS"));
    }

    #[tokio::test]
    async fn fetch_page_unwraps_hits() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(serde_json::json!({
                "params": {
                    "name": "confluence_get_all_pages_from_space",
                    "arguments": { "space_key": "DOCS" }
                }
            })))
            .respond_with(tool_response(serde_json::json!({
                "results": [
                    { "content": { "id": "11", "title": "Wrapped" } },
                    { "id": "12", "title": "Bare" }
                ]
            })))
            .mount(&server)
            .await;

        let source = WikiSource::new(&session);
        let pages = source.fetch_page("DOCS", 50, 0).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id.as_deref(), Some("11"));
        assert_eq!(pages[1].id.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn page_versions_accepts_bare_list() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(
                serde_json::json!({"params": {"name": "confluence_get_page_versions"}}),
            ))
            .respond_with(tool_response(serde_json::json!([
                { "by": { "userKey": "uk-1" }, "when": "2024-01-01T00:00:00Z", "number": 1 },
                { "by": { "userKey": "uk-2" }, "when": "2024-01-02T00:00:00Z", "number": 2 }
            ])))
            .mount(&server)
            .await;

        let source = WikiSource::new(&session);
        let history = source.page_versions("p1").await.unwrap();
        assert_eq!(history.results.len(), 2);
        assert_eq!(history.size, Some(2));
    }

    #[tokio::test]
    async fn page_labels_tolerate_non_list_payload() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(
                serde_json::json!({"params": {"name": "confluence_get_labels"}}),
            ))
            .respond_with(tool_response(serde_json::json!({ "message": "none" })))
            .mount(&server)
            .await;

        let source = WikiSource::new(&session);
        let labels = source.page_labels("p1").await.unwrap();
        assert!(labels.is_empty());
    }

    #[tokio::test]
    async fn page_visits_group_by_user_key() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(
                serde_json::json!({"params": {"name": "confluence_get_visit_history"}}),
            ))
            .respond_with(tool_response(serde_json::json!({
                "uk-1": [ { "visitDate": "2024-01-01", "lastVisit": "2024-01-01T09:00:00Z" } ],
                "uk-2": []
            })))
            .mount(&server)
            .await;

        let source = WikiSource::new(&session);
        let visits = source
            .page_visits("p1", &["uk-1".to_string(), "uk-2".to_string()])
            .await
            .unwrap();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits["uk-1"].len(), 1);
    }
}
