use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;

use crate::upsert::Upsertable;

/// A wiki actor. Natural key is `user_key`, joined case-insensitively.
/// Insert-if-absent: rows enriched from other systems survive re-crawls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiUser {
    pub user_key: String,
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub roles: Option<String>,
    pub english_name: Option<String>,
    pub is_resigned: bool,
}

impl Upsertable for WikiUser {
    const TABLE: &'static str = "wiki_users";
    const COLUMNS: &'static [&'static str] = &[
        "user_key",
        "user_id",
        "display_name",
        "avatar_url",
        "roles",
        "english_name",
        "is_resigned",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["user_key"];
    const MERGEABLE: &'static [&'static str] = &[];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.user_key);
        row.push_bind(&self.user_id);
        row.push_bind(&self.display_name);
        row.push_bind(&self.avatar_url);
        row.push_bind(&self.roles);
        row.push_bind(&self.english_name);
        row.push_bind(self.is_resigned);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub space_id: String,
    pub space_key: String,
    pub space_name: String,
    pub space_type: String,
    pub status: String,
    pub description: Option<String>,
    pub homepage_id: Option<String>,
}

impl Upsertable for Space {
    const TABLE: &'static str = "wiki_spaces";
    const COLUMNS: &'static [&'static str] = &[
        "space_id",
        "space_key",
        "space_name",
        "space_type",
        "status",
        "description",
        "homepage_id",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["space_key"];
    const MERGEABLE: &'static [&'static str] = &[
        "space_name",
        "space_type",
        "status",
        "description",
        "homepage_id",
    ];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.space_id);
        row.push_bind(&self.space_key);
        row.push_bind(&self.space_name);
        row.push_bind(&self.space_type);
        row.push_bind(&self.status);
        row.push_bind(&self.description);
        row.push_bind(&self.homepage_id);
    }
}

/// The primary wiki content entity.
///
/// `created_by_id` / `last_modified_by_id` are surrogate keys of persisted
/// users, filled by the assembler after user rows exist; `None` when the
/// reference could not be resolved. `parent_page_ids` is the ordered ancestor
/// chain, comma-encoded, and `nearest_parent_id` its first element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_id: String,
    pub title: String,
    pub url: String,
    pub views: i64,
    pub last_modified_by: String,
    pub last_modified_by_key: Option<String>,
    pub last_modified_by_id: Option<i64>,
    pub created_by_display_name: Option<String>,
    pub created_by_key: Option<String>,
    pub created_by_id: Option<i64>,
    pub number_of_versions: i32,
    pub parent_page_ids: Option<String>,
    pub nearest_parent_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub space_key: Option<String>,
    pub content_type: String,
    pub status: String,
    pub version_number: i32,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl Upsertable for Page {
    const TABLE: &'static str = "wiki_pages";
    const COLUMNS: &'static [&'static str] = &[
        "page_id",
        "title",
        "url",
        "views",
        "last_modified_by",
        "last_modified_by_key",
        "last_modified_by_id",
        "created_by_display_name",
        "created_by_key",
        "created_by_id",
        "number_of_versions",
        "parent_page_ids",
        "nearest_parent_id",
        "created_at",
        "space_key",
        "content_type",
        "status",
        "version_number",
        "last_modified_at",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["page_id"];
    const MERGEABLE: &'static [&'static str] = &[
        "title",
        "url",
        "views",
        "last_modified_by",
        "last_modified_by_key",
        "last_modified_by_id",
        "created_by_id",
        "number_of_versions",
        "parent_page_ids",
        "nearest_parent_id",
        "created_at",
        "space_key",
        "content_type",
        "status",
        "version_number",
        "last_modified_at",
    ];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.page_id);
        row.push_bind(&self.title);
        row.push_bind(&self.url);
        row.push_bind(self.views);
        row.push_bind(&self.last_modified_by);
        row.push_bind(&self.last_modified_by_key);
        row.push_bind(self.last_modified_by_id);
        row.push_bind(&self.created_by_display_name);
        row.push_bind(&self.created_by_key);
        row.push_bind(self.created_by_id);
        row.push_bind(self.number_of_versions);
        row.push_bind(&self.parent_page_ids);
        row.push_bind(&self.nearest_parent_id);
        row.push_bind(self.created_at);
        row.push_bind(&self.space_key);
        row.push_bind(&self.content_type);
        row.push_bind(&self.status);
        row.push_bind(self.version_number);
        row.push_bind(self.last_modified_at);
    }
}

/// Per-user view aggregate for one page. The surrogate id of a persisted
/// View row is what visit-history rows point at, so Views must be saved
/// before VisitHistories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub page_id: String,
    pub user_key: String,
    pub total: i64,
    pub last_view: Option<DateTime<Utc>>,
}

impl Upsertable for View {
    const TABLE: &'static str = "wiki_views";
    const COLUMNS: &'static [&'static str] = &["page_id", "user_key", "total", "last_view"];
    const CONFLICT_KEY: &'static [&'static str] = &["page_id", "user_key"];
    const MERGEABLE: &'static [&'static str] = &["total", "last_view"];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.page_id);
        row.push_bind(&self.user_key);
        row.push_bind(self.total);
        row.push_bind(self.last_view);
    }
}

/// One row per historical version of a page: who modified it and when.
/// Version count vs. existing row count detects already-synced pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    pub page_id: String,
    pub user_key: String,
    pub version: i32,
    pub when_modified: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub minor_edit: bool,
}

impl Upsertable for Contributor {
    const TABLE: &'static str = "wiki_contributors";
    const COLUMNS: &'static [&'static str] = &[
        "page_id",
        "user_key",
        "version",
        "when_modified",
        "message",
        "minor_edit",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["page_id", "user_key", "version"];
    const MERGEABLE: &'static [&'static str] = &["when_modified", "message", "minor_edit"];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.page_id);
        row.push_bind(&self.user_key);
        row.push_bind(self.version);
        row.push_bind(self.when_modified);
        row.push_bind(&self.message);
        row.push_bind(self.minor_edit);
    }
}

/// One row per individual visit event, keyed to its parent View's surrogate
/// id, which is only knowable after the View row has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitHistory {
    pub views_id: i64,
    pub visit_date: String,
    pub unix_date: Option<String>,
    pub visit_timestamp: Option<DateTime<Utc>>,
}

impl Upsertable for VisitHistory {
    const TABLE: &'static str = "wiki_visit_histories";
    const COLUMNS: &'static [&'static str] =
        &["views_id", "visit_date", "unix_date", "visit_timestamp"];
    const CONFLICT_KEY: &'static [&'static str] = &["views_id", "visit_date"];
    const MERGEABLE: &'static [&'static str] = &[];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.views_id);
        row.push_bind(&self.visit_date);
        row.push_bind(&self.unix_date);
        row.push_bind(self.visit_timestamp);
    }
}

/// `(page, label)` pair saved with full-replace semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiLabel {
    pub page_id: String,
    pub label_name: String,
    pub label_prefix: Option<String>,
}

impl Upsertable for WikiLabel {
    const TABLE: &'static str = "wiki_labels";
    const COLUMNS: &'static [&'static str] = &["page_id", "label_name", "label_prefix"];
    const CONFLICT_KEY: &'static [&'static str] = &["page_id", "label_name"];
    const MERGEABLE: &'static [&'static str] = &[];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.page_id);
        row.push_bind(&self.label_name);
        row.push_bind(&self.label_prefix);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiComment {
    pub comment_id: String,
    pub page_id: String,
    pub comment_title: Option<String>,
    pub comment_body: Option<String>,
    pub author_user_key: Option<String>,
    pub assignee_code: Option<String>,
    pub display_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version_number: i32,
    pub status: String,
}

impl Upsertable for WikiComment {
    const TABLE: &'static str = "wiki_comments";
    const COLUMNS: &'static [&'static str] = &[
        "comment_id",
        "page_id",
        "comment_title",
        "comment_body",
        "author_user_key",
        "assignee_code",
        "display_name",
        "created_at",
        "updated_at",
        "version_number",
        "status",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["comment_id"];
    const MERGEABLE: &'static [&'static str] = &[
        "comment_title",
        "comment_body",
        "author_user_key",
        "created_at",
        "updated_at",
        "version_number",
        "status",
    ];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.comment_id);
        row.push_bind(&self.page_id);
        row.push_bind(&self.comment_title);
        row.push_bind(&self.comment_body);
        row.push_bind(&self.author_user_key);
        row.push_bind(&self.assignee_code);
        row.push_bind(&self.display_name);
        row.push_bind(self.created_at);
        row.push_bind(self.updated_at);
        row.push_bind(self.version_number);
        row.push_bind(&self.status);
    }
}
