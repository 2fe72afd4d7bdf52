use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;

use crate::upsert::Upsertable;

/// An actor referenced by tracker issues (assignee, reporter, changelog
/// author). Insert-if-absent: re-crawling a known user must not clobber
/// fields enriched elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerUser {
    pub account_id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
    pub active: bool,
}

impl Upsertable for TrackerUser {
    const TABLE: &'static str = "tracker_users";
    const COLUMNS: &'static [&'static str] = &[
        "account_id",
        "user_id",
        "display_name",
        "email_address",
        "active",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["account_id"];
    const MERGEABLE: &'static [&'static str] = &[];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.account_id);
        row.push_bind(&self.user_id);
        row.push_bind(&self.display_name);
        row.push_bind(&self.email_address);
        row.push_bind(self.active);
    }
}

/// A project scope. `placeholder` marks rows synthesized from an issue key
/// prefix when the raw record embedded no project object; a later save of the
/// real project overwrites them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub project_type: Option<String>,
    pub description: Option<String>,
    pub lead_account_id: Option<String>,
    pub placeholder: bool,
}

impl Upsertable for Project {
    const TABLE: &'static str = "tracker_projects";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "key",
        "name",
        "url",
        "project_type",
        "description",
        "lead_account_id",
        "placeholder",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["key"];
    const MERGEABLE: &'static [&'static str] = &[
        "id",
        "name",
        "url",
        "project_type",
        "description",
        "lead_account_id",
        "placeholder",
    ];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id);
        row.push_bind(&self.key);
        row.push_bind(&self.name);
        row.push_bind(&self.url);
        row.push_bind(&self.project_type);
        row.push_bind(&self.description);
        row.push_bind(&self.lead_account_id);
        row.push_bind(self.placeholder);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status_category: serde_json::Value,
}

impl Upsertable for Status {
    const TABLE: &'static str = "tracker_statuses";
    const COLUMNS: &'static [&'static str] = &["id", "name", "description", "status_category"];
    const CONFLICT_KEY: &'static [&'static str] = &["id"];
    const MERGEABLE: &'static [&'static str] = &["name", "description", "status_category"];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id);
        row.push_bind(&self.name);
        row.push_bind(&self.description);
        row.push_bind(&self.status_category);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixVersion {
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub archived: bool,
    pub released: bool,
    pub release_date: Option<DateTime<Utc>>,
    pub project_id: String,
}

impl Upsertable for FixVersion {
    const TABLE: &'static str = "tracker_fix_versions";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "url",
        "description",
        "archived",
        "released",
        "release_date",
        "project_id",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["id"];
    const MERGEABLE: &'static [&'static str] = &[
        "name",
        "url",
        "description",
        "archived",
        "released",
        "release_date",
        "project_id",
    ];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id);
        row.push_bind(&self.name);
        row.push_bind(&self.url);
        row.push_bind(&self.description);
        row.push_bind(self.archived);
        row.push_bind(self.released);
        row.push_bind(self.release_date);
        row.push_bind(&self.project_id);
    }
}

/// The primary tracker content entity.
///
/// `resolved_date` is never null when an updated timestamp exists: the mapper
/// defaults it to `updated` when the source provides no explicit value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub url: Option<String>,
    pub summary: String,
    pub status_id: String,
    pub status_name: Option<String>,
    pub issue_type_id: Option<String>,
    pub priority_id: Option<String>,
    pub project_id: String,
    pub project_key: String,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
    pub reporter_id: Option<String>,
    pub fix_version_id: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub resolved_date: Option<DateTime<Utc>>,
    pub time_estimate: Option<i64>,
    pub time_original_estimate: Option<i64>,
    pub custom_fields: serde_json::Value,
}

impl Upsertable for Issue {
    const TABLE: &'static str = "tracker_issues";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "key",
        "url",
        "summary",
        "status_id",
        "status_name",
        "issue_type_id",
        "priority_id",
        "project_id",
        "project_key",
        "assignee_id",
        "assignee_name",
        "reporter_id",
        "fix_version_id",
        "created",
        "updated",
        "resolved_date",
        "time_estimate",
        "time_original_estimate",
        "custom_fields",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["id"];
    const MERGEABLE: &'static [&'static str] = &[
        "key",
        "url",
        "summary",
        "status_id",
        "status_name",
        "issue_type_id",
        "priority_id",
        "project_id",
        "project_key",
        "assignee_id",
        "assignee_name",
        "reporter_id",
        "fix_version_id",
        "created",
        "updated",
        "resolved_date",
        "time_estimate",
        "time_original_estimate",
        "custom_fields",
    ];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id);
        row.push_bind(&self.key);
        row.push_bind(&self.url);
        row.push_bind(&self.summary);
        row.push_bind(&self.status_id);
        row.push_bind(&self.status_name);
        row.push_bind(&self.issue_type_id);
        row.push_bind(&self.priority_id);
        row.push_bind(&self.project_id);
        row.push_bind(&self.project_key);
        row.push_bind(&self.assignee_id);
        row.push_bind(&self.assignee_name);
        row.push_bind(&self.reporter_id);
        row.push_bind(&self.fix_version_id);
        row.push_bind(self.created);
        row.push_bind(self.updated);
        row.push_bind(self.resolved_date);
        row.push_bind(self.time_estimate);
        row.push_bind(self.time_original_estimate);
        row.push_bind(&self.custom_fields);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub issue_id: String,
}

impl Upsertable for Component {
    const TABLE: &'static str = "tracker_components";
    const COLUMNS: &'static [&'static str] = &["id", "name", "description", "url", "issue_id"];
    const CONFLICT_KEY: &'static [&'static str] = &["id"];
    const MERGEABLE: &'static [&'static str] = &["name", "description", "url", "issue_id"];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id);
        row.push_bind(&self.name);
        row.push_bind(&self.description);
        row.push_bind(&self.url);
        row.push_bind(&self.issue_id);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub key: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub issue_id: String,
}

impl Upsertable for Subtask {
    const TABLE: &'static str = "tracker_subtasks";
    const COLUMNS: &'static [&'static str] = &["id", "key", "name", "url", "issue_id"];
    const CONFLICT_KEY: &'static [&'static str] = &["id"];
    const MERGEABLE: &'static [&'static str] = &["key", "name", "url", "issue_id"];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id);
        row.push_bind(&self.key);
        row.push_bind(&self.name);
        row.push_bind(&self.url);
        row.push_bind(&self.issue_id);
    }
}

/// `(issue, label)` pair with no identity of its own. Saved with
/// full-replace semantics so labels removed upstream disappear here too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLabel {
    pub issue_id: String,
    pub label_name: String,
}

impl Upsertable for IssueLabel {
    const TABLE: &'static str = "tracker_labels";
    const COLUMNS: &'static [&'static str] = &["issue_id", "label_name"];
    const CONFLICT_KEY: &'static [&'static str] = &["issue_id", "label_name"];
    const MERGEABLE: &'static [&'static str] = &[];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.issue_id);
        row.push_bind(&self.label_name);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFixVersion {
    pub issue_id: String,
    pub fix_version_id: String,
}

impl Upsertable for IssueFixVersion {
    const TABLE: &'static str = "tracker_issue_fix_versions";
    const COLUMNS: &'static [&'static str] = &["issue_id", "fix_version_id"];
    const CONFLICT_KEY: &'static [&'static str] = &["issue_id", "fix_version_id"];
    const MERGEABLE: &'static [&'static str] = &[];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.issue_id);
        row.push_bind(&self.fix_version_id);
    }
}

/// One changelog history entry, its field transitions kept as an opaque
/// serialized list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changelog {
    pub id: String,
    pub issue_id: String,
    pub created: Option<DateTime<Utc>>,
    pub author_id: Option<String>,
    pub items: serde_json::Value,
}

impl Upsertable for Changelog {
    const TABLE: &'static str = "tracker_changelogs";
    const COLUMNS: &'static [&'static str] = &["id", "issue_id", "created", "author_id", "items"];
    const CONFLICT_KEY: &'static [&'static str] = &["id"];
    const MERGEABLE: &'static [&'static str] = &["issue_id", "created", "author_id", "items"];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.id);
        row.push_bind(&self.issue_id);
        row.push_bind(self.created);
        row.push_bind(&self.author_id);
        row.push_bind(&self.items);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub comment_id: String,
    pub issue_id: String,
    pub body: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Upsertable for IssueComment {
    const TABLE: &'static str = "tracker_comments";
    const COLUMNS: &'static [&'static str] = &[
        "comment_id",
        "issue_id",
        "body",
        "author_id",
        "author_name",
        "created_at",
        "updated_at",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["comment_id"];
    const MERGEABLE: &'static [&'static str] = &[
        "issue_id",
        "body",
        "author_id",
        "author_name",
        "created_at",
        "updated_at",
    ];

    fn bind<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.comment_id);
        row.push_bind(&self.issue_id);
        row.push_bind(&self.body);
        row.push_bind(&self.author_id);
        row.push_bind(&self.author_name);
        row.push_bind(self.created_at);
        row.push_bind(self.updated_at);
    }
}
