use std::collections::HashMap;
use std::time::Duration;

use syncline_common::error::SynclineResult;
use syncline_db::wiki::models::{Page, VisitHistory};
use syncline_db::wiki::repositories::WikiSink;

use crate::walker::{CrawlProgress, Walker};

use super::mapper::{self, WikiBatch};
use super::models::{RawPage, RawVisit};
use super::source::WikiSource;

/// Attach persisted user surrogate ids to a page's author references.
/// Unresolved references stay explicitly null; partial data beats losing
/// the page.
fn link_page_authors(page: &mut Page, user_ids: &HashMap<String, i64>) {
    page.created_by_id = page
        .created_by_key
        .as_ref()
        .and_then(|key| user_ids.get(&key.to_lowercase()))
        .copied();
    if page.created_by_id.is_none() && page.created_by_key.is_some() {
        tracing::warn!(page = %page.page_id, key = ?page.created_by_key, "creator not resolvable");
    }

    page.last_modified_by_id = page
        .last_modified_by_key
        .as_ref()
        .and_then(|key| user_ids.get(&key.to_lowercase()))
        .copied();
    if page.last_modified_by_id.is_none() && page.last_modified_by_key.is_some() {
        tracing::warn!(page = %page.page_id, key = ?page.last_modified_by_key, "modifier not resolvable");
    }
}

/// Turn visit events into rows keyed by their parent View's surrogate id.
/// Events whose View row cannot be resolved are dropped with a warning;
/// the row is meaningless without its aggregate.
fn link_visit_histories(
    page_id: &str,
    visits_by_user: &HashMap<String, Vec<RawVisit>>,
    view_ids: &HashMap<String, i64>,
) -> Vec<VisitHistory> {
    let mut rows = Vec::new();

    for (user_key, visits) in visits_by_user {
        let Some(views_id) = view_ids.get(&user_key.to_lowercase()).copied() else {
            tracing::warn!(page = page_id, user = %user_key, "view row not resolvable, dropping visits");
            continue;
        };
        rows.extend(visits.iter().map(|visit| mapper::map_visit(views_id, visit)));
    }

    rows
}

/// One full crawl over the wiki: every space, every page, and each page's
/// labels, comments, views, visit events and version history.
pub struct WikiCrawl<'a, S: WikiSink> {
    source: WikiSource<'a>,
    sink: &'a S,
    walker: Walker,
    record_delay: Duration,
}

impl<'a, S> WikiCrawl<'a, S>
where
    S: WikiSink,
{
    pub fn new(
        source: WikiSource<'a>,
        sink: &'a S,
        walker: Walker,
        record_delay: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            walker,
            record_delay,
        }
    }

    pub async fn run(&self, progress: &mut CrawlProgress) -> SynclineResult<()> {
        // A space listing that cannot be fetched at all fails the crawl.
        let raw_spaces = self.source.list_spaces().await?;
        let spaces: Vec<_> = raw_spaces.iter().filter_map(mapper::map_space).collect();
        self.sink.save_spaces(&spaces).await?;

        progress.total_scopes = spaces.len();
        tracing::info!(count = spaces.len(), "found wiki spaces");

        for space in &spaces {
            progress.current_scope = Some(space.space_key.clone());

            let pages = match self.walker.collect_scope(&self.source, &space.space_key).await {
                Ok(pages) => pages,
                Err(e) => {
                    progress.record_error(format!("space {}: {e}", space.space_key));
                    continue;
                }
            };

            progress.total_items += pages.len();
            tracing::info!(space = %space.space_key, count = pages.len(), "fetched pages");

            if let Err(e) = self.process_space(&space.space_key, &pages, progress).await {
                progress.record_error(format!("space {}: {e}", space.space_key));
                continue;
            }

            progress.completed_scopes += 1;
        }

        Ok(())
    }

    /// Fetch details for every page of a space, save the deduplicated batch
    /// in dependency order, then persist each page's children.
    async fn process_space(
        &self,
        space_key: &str,
        pages: &[RawPage],
        progress: &mut CrawlProgress,
    ) -> SynclineResult<()> {
        let mut bundles = Vec::with_capacity(pages.len());

        for page in pages {
            let Some(page_id) = page.id.clone() else {
                progress.record_error(format!("space {space_key}: page without id"));
                continue;
            };
            progress.current_item = Some(page_id.clone());

            match self.source.page_detail(&page_id).await {
                Ok(detail) => match mapper::extract_bundle(&detail) {
                    Ok(bundle) => bundles.push(bundle),
                    Err(e) => progress.record_error(format!("page {page_id}: {e}")),
                },
                Err(e) => progress.record_error(format!("page {page_id}: {e}")),
            }

            if !self.record_delay.is_zero() {
                tokio::time::sleep(self.record_delay).await;
            }
        }

        let mut batch: WikiBatch = mapper::collect_batch(bundles);

        // users, then spaces, then pages, with author references resolved
        // in between
        self.sink.save_users(&batch.users).await?;
        self.sink.save_spaces(&batch.spaces).await?;

        let author_keys: Vec<String> = batch
            .pages
            .iter()
            .flat_map(|p| [p.created_by_key.clone(), p.last_modified_by_key.clone()])
            .flatten()
            .collect();
        let user_ids = self.sink.user_ids_by_keys(&author_keys).await?;
        for page in &mut batch.pages {
            link_page_authors(page, &user_ids);
        }
        self.sink.save_pages(&batch.pages).await?;

        for page in &batch.pages {
            match self.process_page_children(&page.page_id).await {
                Ok(()) => progress.completed_items += 1,
                Err(e) => progress.record_error(format!("page {}: {e}", page.page_id)),
            }
        }

        Ok(())
    }

    async fn process_page_children(&self, page_id: &str) -> SynclineResult<()> {
        // views before visit histories: the visit rows need the persisted
        // View surrogate ids
        let raw_views = match self.source.page_views(page_id).await {
            Ok(views) => views,
            Err(e) => {
                tracing::warn!(page = page_id, error = %e, "view fetch failed");
                Vec::new()
            }
        };
        let views: Vec<_> = raw_views
            .iter()
            .filter_map(|v| mapper::map_view(page_id, v))
            .collect();
        self.sink.save_views(&views).await?;

        self.sync_contributors(page_id).await?;

        if !views.is_empty() {
            let user_keys: Vec<String> = views.iter().map(|v| v.user_key.clone()).collect();
            let visits_by_user = match self.source.page_visits(page_id, &user_keys).await {
                Ok(visits) => visits,
                Err(e) => {
                    tracing::warn!(page = page_id, error = %e, "visit history fetch failed");
                    HashMap::new()
                }
            };
            if !visits_by_user.is_empty() {
                let view_ids = self.sink.view_ids_for_page(page_id).await?;
                let rows = link_visit_histories(page_id, &visits_by_user, &view_ids);
                self.sink.save_visit_histories(&rows).await?;
            }
        }

        let labels: Vec<_> = match self.source.page_labels(page_id).await {
            Ok(raw) => raw
                .iter()
                .filter_map(|l| mapper::map_label(page_id, l))
                .collect(),
            Err(e) => {
                tracing::warn!(page = page_id, error = %e, "label fetch failed");
                Vec::new()
            }
        };
        self.sink
            .replace_labels(&[page_id.to_string()], &labels)
            .await?;

        let comments: Vec<_> = match self.source.page_comments(page_id).await {
            Ok(raw) => raw
                .iter()
                .filter_map(|c| mapper::map_comment(c, Some(page_id)))
                .collect(),
            Err(e) => {
                tracing::warn!(page = page_id, error = %e, "comment fetch failed");
                Vec::new()
            }
        };
        self.sink.save_comments(&comments).await?;

        Ok(())
    }

    /// Contributors come from the version history. When the version count
    /// matches the rows already present the page is fully synced and the
    /// stage is skipped.
    async fn sync_contributors(&self, page_id: &str) -> SynclineResult<()> {
        let history = match self.source.page_versions(page_id).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(page = page_id, error = %e, "version history fetch failed");
                return Ok(());
            }
        };

        let version_count = history.size.unwrap_or(history.results.len() as i64);
        let existing = self.sink.contributor_count(page_id).await?;
        if existing == version_count && version_count > 0 {
            tracing::debug!(page = page_id, "contributors already in sync");
            return Ok(());
        }

        let contributor_users = mapper::dedup_users(
            history
                .results
                .iter()
                .filter_map(|v| v.by.as_ref())
                .map(mapper::map_user)
                .collect(),
        );
        self.sink.save_users(&contributor_users).await?;

        let contributors: Vec<_> = history
            .results
            .iter()
            .filter_map(|v| mapper::map_contributor(page_id, v))
            .collect();
        self.sink.save_contributors(&contributors).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{McpConfig, McpSession};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use syncline_db::wiki::models::{
        Contributor, Space, View, WikiComment, WikiLabel, WikiUser,
    };
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ── Assembler unit tests ────────────────────────────────────

    fn sample_page(id: &str) -> Page {
        Page {
            page_id: id.to_string(),
            title: "T".to_string(),
            url: String::new(),
            views: 0,
            last_modified_by: String::new(),
            last_modified_by_key: Some("Editor-Key".to_string()),
            last_modified_by_id: None,
            created_by_display_name: None,
            created_by_key: Some("creator-key".to_string()),
            created_by_id: None,
            number_of_versions: 1,
            parent_page_ids: None,
            nearest_parent_id: None,
            created_at: None,
            space_key: None,
            content_type: "page".to_string(),
            status: "current".to_string(),
            version_number: 1,
            last_modified_at: None,
        }
    }

    #[test]
    fn link_page_authors_resolves_case_insensitively() {
        let mut page = sample_page("p1");
        let ids = HashMap::from([
            ("creator-key".to_string(), 7_i64),
            ("editor-key".to_string(), 9_i64),
        ]);

        link_page_authors(&mut page, &ids);
        assert_eq!(page.created_by_id, Some(7));
        assert_eq!(page.last_modified_by_id, Some(9));
    }

    #[test]
    fn link_page_authors_leaves_unresolved_null() {
        let mut page = sample_page("p1");
        link_page_authors(&mut page, &HashMap::new());
        assert!(page.created_by_id.is_none());
        assert!(page.last_modified_by_id.is_none());
    }

    #[test]
    fn link_visit_histories_drops_unresolved_views() {
        let visits = HashMap::from([
            (
                "uk-1".to_string(),
                vec![RawVisit {
                    visit_date: Some("2024-01-01".to_string()),
                    last_visit: None,
                }],
            ),
            (
                "uk-ghost".to_string(),
                vec![RawVisit {
                    visit_date: Some("2024-01-02".to_string()),
                    last_visit: None,
                }],
            ),
        ]);
        let view_ids = HashMap::from([("uk-1".to_string(), 42_i64)]);

        let rows = link_visit_histories("p1", &visits, &view_ids);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].views_id, 42);
    }

    // ── Mock WikiSink ───────────────────────────────────────────

    #[derive(Clone, Default)]
    struct MockWikiSink {
        ops: Arc<Mutex<Vec<String>>>,
        users: Arc<Mutex<Vec<WikiUser>>>,
        pages: Arc<Mutex<Vec<Page>>>,
        views: Arc<Mutex<Vec<View>>>,
        visits: Arc<Mutex<Vec<VisitHistory>>>,
        contributors: Arc<Mutex<Vec<Contributor>>>,
        contributor_count: Arc<Mutex<i64>>,
    }

    impl MockWikiSink {
        fn log(&self, op: &str) {
            self.ops.lock().unwrap().push(op.to_string());
        }
    }

    #[async_trait]
    impl WikiSink for MockWikiSink {
        async fn save_users(&self, users: &[WikiUser]) -> SynclineResult<()> {
            self.log("users");
            self.users.lock().unwrap().extend_from_slice(users);
            Ok(())
        }

        async fn save_spaces(&self, _spaces: &[Space]) -> SynclineResult<()> {
            self.log("spaces");
            Ok(())
        }

        async fn save_pages(&self, pages: &[Page]) -> SynclineResult<()> {
            self.log("pages");
            self.pages.lock().unwrap().extend_from_slice(pages);
            Ok(())
        }

        async fn save_views(&self, views: &[View]) -> SynclineResult<()> {
            self.log("views");
            self.views.lock().unwrap().extend_from_slice(views);
            Ok(())
        }

        async fn save_contributors(&self, contributors: &[Contributor]) -> SynclineResult<()> {
            self.log("contributors");
            self.contributors
                .lock()
                .unwrap()
                .extend_from_slice(contributors);
            Ok(())
        }

        async fn save_visit_histories(&self, visits: &[VisitHistory]) -> SynclineResult<()> {
            self.log("visit_histories");
            self.visits.lock().unwrap().extend_from_slice(visits);
            Ok(())
        }

        async fn replace_labels(
            &self,
            _page_ids: &[String],
            _labels: &[WikiLabel],
        ) -> SynclineResult<()> {
            self.log("labels");
            Ok(())
        }

        async fn save_comments(&self, _comments: &[WikiComment]) -> SynclineResult<()> {
            self.log("comments");
            Ok(())
        }

        async fn user_ids_by_keys(
            &self,
            keys: &[String],
        ) -> SynclineResult<HashMap<String, i64>> {
            self.log("resolve_users");
            Ok(keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.to_lowercase(), i as i64 + 1))
                .collect())
        }

        async fn view_ids_for_page(&self, _page_id: &str) -> SynclineResult<HashMap<String, i64>> {
            self.log("resolve_views");
            Ok(self
                .views
                .lock()
                .unwrap()
                .iter()
                .enumerate()
                .map(|(i, v)| (v.user_key.to_lowercase(), i as i64 + 100))
                .collect())
        }

        async fn contributor_count(&self, _page_id: &str) -> SynclineResult<i64> {
            self.log("contributor_count");
            Ok(*self.contributor_count.lock().unwrap())
        }
    }

    // ── MCP fixtures ────────────────────────────────────────────

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

    async fn mount_tool(
        server: &MockServer,
        partial: serde_json::Value,
        payload: serde_json::Value,
    ) {
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(partial))
            .respond_with(tool_response(payload))
            .mount(server)
            .await;
    }

    async fn mount_space_fixtures(server: &MockServer) {
        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_search"}}),
            serde_json::json!({
                "results": [
                    { "content": { "id": "1001" }, "space": { "id": 5, "key": "DOCS", "name": "Docs" } }
                ]
            }),
        )
        .await;

        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_get_all_pages_from_space"}}),
            serde_json::json!({ "results": [ { "id": "1001", "title": "Welcome" } ] }),
        )
        .await;

        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_get_page"}}),
            serde_json::json!({
                "id": "1001",
                "type": "page",
                "title": "Welcome",
                "space": { "id": 5, "key": "DOCS", "name": "Docs" },
                "author": { "userKey": "creator-key", "displayName": "Creator" },
                "version": {
                    "by": { "userKey": "editor-key", "displayName": "Editor" },
                    "when": "2024-04-01T07:00:00Z",
                    "number": 2
                }
            }),
        )
        .await;

        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_get_page_views"}}),
            serde_json::json!([
                { "userKey": "viewer-1", "views": 5, "lastViewDateFormatted": "2024-04-02T10:00:00Z" }
            ]),
        )
        .await;

        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_get_visit_history"}}),
            serde_json::json!({
                "viewer-1": [ { "visitDate": "2024-04-02", "lastVisit": "2024-04-02T10:00:00Z" } ]
            }),
        )
        .await;

        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_get_page_versions"}}),
            serde_json::json!([
                { "by": { "userKey": "creator-key", "displayName": "Creator" },
                  "when": "2024-03-01T00:00:00Z", "number": 1 },
                { "by": { "userKey": "editor-key", "displayName": "Editor" },
                  "when": "2024-04-01T07:00:00Z", "number": 2 }
            ]),
        )
        .await;

        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_get_labels"}}),
            serde_json::json!([ { "id": "l1", "name": "howto" } ]),
        )
        .await;

        mount_tool(
            server,
            serde_json::json!({"params": {"name": "confluence_get_comments"}}),
            serde_json::json!([
                { "id": "c1", "body": "nice page",
                  "version": { "by": { "userKey": "viewer-1" }, "when": "2024-04-03T00:00:00Z", "number": 1 } }
            ]),
        )
        .await;
    }

    fn walker() -> Walker {
        Walker {
            page_size: 50,
            max_items: None,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn crawl_enforces_save_order() {
        let server = MockServer::start().await;
        let session = session(&server).await;
        mount_space_fixtures(&server).await;

        let sink = MockWikiSink::default();
        let crawl = WikiCrawl::new(WikiSource::new(&session), &sink, walker(), Duration::ZERO);

        let mut progress = CrawlProgress::new("wiki");
        crawl.run(&mut progress).await.expect("crawl should run");

        assert!(progress.errors.is_empty(), "errors: {:?}", progress.errors);
        assert_eq!(progress.completed_scopes, 1);
        assert_eq!(progress.completed_items, 1);
        assert_eq!(progress.current_scope.as_deref(), Some("DOCS"));
        assert_eq!(progress.current_item.as_deref(), Some("1001"));

        let ops = sink.ops.lock().unwrap().clone();
        let pos = |op: &str| {
            ops.iter()
                .position(|o| o == op)
                .unwrap_or_else(|| panic!("missing op {op} in {ops:?}"))
        };

        assert!(pos("users") < pos("pages"));
        assert!(pos("resolve_users") < pos("pages"));
        assert!(pos("pages") < pos("views"));
        // the invariant: a View row is always persisted before any
        // VisitHistory pointing at it
        assert!(pos("views") < pos("resolve_views"));
        assert!(pos("resolve_views") < pos("visit_histories"));
        assert!(pos("views") < pos("visit_histories"));
        assert!(pos("contributors") < pos("visit_histories"));
        assert!(pos("visit_histories") < pos("labels"));
        assert!(pos("labels") < pos("comments"));
    }

    #[tokio::test]
    async fn crawl_links_authors_and_visits() {
        let server = MockServer::start().await;
        let session = session(&server).await;
        mount_space_fixtures(&server).await;

        let sink = MockWikiSink::default();
        let crawl = WikiCrawl::new(WikiSource::new(&session), &sink, walker(), Duration::ZERO);

        let mut progress = CrawlProgress::new("wiki");
        crawl.run(&mut progress).await.expect("crawl should run");

        let pages = sink.pages.lock().unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].created_by_id.is_some());
        assert!(pages[0].last_modified_by_id.is_some());

        let visits = sink.visits.lock().unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].views_id, 100);

        let contributors = sink.contributors.lock().unwrap();
        assert_eq!(contributors.len(), 2);
    }

    #[tokio::test]
    async fn contributors_skipped_when_in_sync() {
        let server = MockServer::start().await;
        let session = session(&server).await;
        mount_space_fixtures(&server).await;

        let sink = MockWikiSink::default();
        *sink.contributor_count.lock().unwrap() = 2; // matches version count

        let crawl = WikiCrawl::new(WikiSource::new(&session), &sink, walker(), Duration::ZERO);
        let mut progress = CrawlProgress::new("wiki");
        crawl.run(&mut progress).await.expect("crawl should run");

        assert!(sink.contributors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_space_is_isolated() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        mount_tool(
            &server,
            serde_json::json!({"params": {"name": "confluence_search"}}),
            serde_json::json!({
                "results": [
                    { "content": { "id": "1" }, "space": { "id": 1, "key": "GOOD", "name": "Good" } },
                    { "content": { "id": "2" }, "space": { "id": 2, "key": "BAD", "name": "Bad" } }
                ]
            }),
        )
        .await;

        // GOOD has an empty page listing; BAD fails outright
        mount_tool(
            &server,
            serde_json::json!({
                "params": {
                    "name": "confluence_get_all_pages_from_space",
                    "arguments": { "space_key": "GOOD" }
                }
            }),
            serde_json::json!({ "results": [] }),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(serde_json::json!({
                "params": {
                    "name": "confluence_get_all_pages_from_space",
                    "arguments": { "space_key": "BAD" }
                }
            })))
            .respond_with(ResponseTemplate::new(500).set_body_string("space down"))
            .mount(&server)
            .await;

        let sink = MockWikiSink::default();
        let crawl = WikiCrawl::new(WikiSource::new(&session), &sink, walker(), Duration::ZERO);

        let mut progress = CrawlProgress::new("wiki");
        crawl.run(&mut progress).await.expect("crawl should run");

        assert_eq!(progress.errors.len(), 1);
        assert!(progress.errors[0].contains("BAD"));
        assert_eq!(progress.completed_scopes, 1);
    }
}
