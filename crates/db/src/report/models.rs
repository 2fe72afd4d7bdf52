use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one crawl invocation. Written once at the end of a crawl,
/// read by nothing; purely observational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRun {
    pub id: Uuid,
    pub source: String,
    pub scopes_total: i64,
    pub scopes_completed: i64,
    pub items_total: i64,
    pub items_completed: i64,
    pub error_count: i64,
    pub errors: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
