mod mcp;
mod time;
mod tracker;
mod walker;
mod wiki;

use std::time::Duration;

use syncline_config::{init_tracing, AppConfig};
use syncline_db::report::models::CrawlRun;
use syncline_db::report::pg_repository::PgCrawlRunRepository;
use syncline_db::tracker::pg_repository::PgTrackerRepository;
use syncline_db::wiki::pg_repository::PgWikiRepository;

use crate::mcp::{McpConfig, McpSession};
use crate::tracker::source::TrackerSource;
use crate::tracker::sync::TrackerCrawl;
use crate::walker::{CrawlProgress, Walker};
use crate::wiki::source::WikiSource;
use crate::wiki::sync::WikiCrawl;

fn summarize(progress: &CrawlProgress) -> CrawlRun {
    CrawlRun {
        id: uuid::Uuid::new_v4(),
        source: progress.source.clone(),
        scopes_total: progress.total_scopes as i64,
        scopes_completed: progress.completed_scopes as i64,
        items_total: progress.total_items as i64,
        items_completed: progress.completed_items as i64,
        error_count: progress.errors.len() as i64,
        errors: serde_json::json!(progress.errors),
        started_at: progress.started_at,
        finished_at: progress.finished_at.unwrap_or(progress.started_at),
    }
}

async fn report(runs: &PgCrawlRunRepository, progress: &CrawlProgress) {
    tracing::info!(
        source = %progress.source,
        scopes = progress.completed_scopes,
        items = progress.completed_items,
        errors = progress.errors.len(),
        "crawl finished"
    );

    if let Err(e) = runs.record(&summarize(progress)).await {
        tracing::error!(error = %e, "failed to record crawl summary");
    }
}

#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = AppConfig::from_env().expect("failed to load configuration");
    tracing::info!(service = "syncline-crawler", "starting");

    let pool = syncline_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    // The session handle lives for the whole crawl; an endpoint that cannot
    // initialize at all is fatal.
    let session = McpSession::connect(&McpConfig {
        base_url: config.mcp_base_url.clone(),
        timeout_secs: config.request_timeout_secs,
    })
    .await
    .expect("failed to initialize MCP session");
    tracing::info!(session = session.session_id(), "MCP session initialized");

    let walker = Walker {
        page_size: config.page_size,
        max_items: config.max_items,
        page_delay: Duration::from_millis(config.page_delay_ms),
    };
    let record_delay = Duration::from_millis(config.record_delay_ms);
    let runs = PgCrawlRunRepository::new(pool.clone());

    // Tracker crawl
    let tracker_sink = PgTrackerRepository::new(pool.clone());
    let tracker_crawl = TrackerCrawl::new(
        TrackerSource::new(&session),
        &tracker_sink,
        walker.clone(),
        config.include_archived,
        record_delay,
    );

    let mut progress = CrawlProgress::new("tracker");
    if let Err(e) = tracker_crawl.run(&mut progress).await {
        progress.record_error(format!("tracker crawl aborted: {e}"));
        tracing::error!(error = %e, "tracker crawl failed");
    }
    progress.finish();
    report(&runs, &progress).await;

    // Wiki crawl
    let wiki_sink = PgWikiRepository::new(pool.clone());
    let wiki_crawl = WikiCrawl::new(
        WikiSource::new(&session),
        &wiki_sink,
        walker.clone(),
        record_delay,
    );

    let mut progress = CrawlProgress::new("wiki");
    if let Err(e) = wiki_crawl.run(&mut progress).await {
        progress.record_error(format!("wiki crawl aborted: {e}"));
        tracing::error!(error = %e, "wiki crawl failed");
    }
    progress.finish();
    report(&runs, &progress).await;

    tracing::info!("crawler finished");
}
