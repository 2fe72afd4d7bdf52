use std::collections::HashSet;

use chrono::Utc;
use serde_json::Value;

use syncline_common::error::{SynclineError, SynclineResult};
use syncline_db::tracker::models::{
    Changelog, Component, FixVersion, Issue, IssueComment, IssueFixVersion, IssueLabel, Project,
    Status, Subtask, TrackerUser,
};

use crate::time::parse_datetime;

use super::models::{
    RawActor, RawChangelogEntry, RawComponent, RawFixVersion, RawIssue, RawIssueComment,
    RawIssueFields, RawNamedRef, RawProject, RawSubtask,
};

/// Custom-field keys already lifted into dedicated columns; everything else
/// in the `customfield_` namespace goes to the opaque side-channel verbatim.
const EXCLUDED_CUSTOM_FIELDS: &[&str] = &["customfield_10014", "customfield_10011"];

const UNKNOWN: &str = "unknown";

/// All extracted entities of one raw issue, fully normalized and
/// self-contained.
#[derive(Debug)]
pub struct IssueBundle {
    pub issue: Issue,
    pub users: Vec<TrackerUser>,
    pub project: Project,
    pub status: Status,
    pub fix_versions: Vec<FixVersion>,
    pub components: Vec<Component>,
    pub labels: Vec<IssueLabel>,
    pub issue_fix_versions: Vec<IssueFixVersion>,
    pub subtasks: Vec<Subtask>,
    pub changelogs: Vec<Changelog>,
    pub comments: Vec<IssueComment>,
}

/// One page worth of bundles merged into per-type lists, sub-entities
/// deduplicated first-seen-wins by natural key.
#[derive(Debug, Default)]
pub struct TrackerBatch {
    pub issues: Vec<Issue>,
    pub users: Vec<TrackerUser>,
    pub projects: Vec<Project>,
    pub statuses: Vec<Status>,
    pub fix_versions: Vec<FixVersion>,
    pub components: Vec<Component>,
    pub labels: Vec<IssueLabel>,
    pub issue_fix_versions: Vec<IssueFixVersion>,
    pub subtasks: Vec<Subtask>,
    pub changelogs: Vec<Changelog>,
    pub comments: Vec<IssueComment>,
}

/// Time-tracking fields arrive as a number or a numeric string.
fn parse_seconds(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn placeholder_user_id() -> String {
    format!("user-{}", Utc::now().timestamp_millis())
}

/// Primary identifier of an actor: canonical id, then name aliases.
fn actor_id(actor: &RawActor) -> Option<String> {
    actor
        .account_id
        .clone()
        .or_else(|| actor.name.clone())
        .or_else(|| actor.username.clone())
}

pub fn map_user(actor: &RawActor) -> TrackerUser {
    let account_id = actor_id(actor)
        .or_else(|| actor.display_name.clone())
        .unwrap_or_else(placeholder_user_id);

    TrackerUser {
        user_id: account_id.clone(),
        account_id,
        display_name: actor.display_name.clone(),
        email_address: actor.email_address.clone(),
        active: actor.active.unwrap_or(false),
    }
}

pub fn map_project(raw: &RawProject) -> Project {
    let key = raw
        .key
        .clone()
        .or_else(|| raw.id.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let id = raw.id.clone().unwrap_or_else(|| key.clone());

    Project {
        id,
        key,
        name: raw.name.clone(),
        url: raw.url.clone(),
        project_type: raw.project_type.clone(),
        description: raw.description.clone(),
        lead_account_id: raw.lead.as_ref().and_then(actor_id),
        placeholder: false,
    }
}

/// Stand-in for an issue whose record embeds no project object: the key is
/// recovered from the issue key's prefix and the row flagged for
/// reconciliation once the real project is saved.
pub fn placeholder_project(issue_key: &str) -> Project {
    let key = issue_key.split('-').next().unwrap_or(UNKNOWN).to_string();

    Project {
        id: key.clone(),
        key,
        name: None,
        url: None,
        project_type: None,
        description: None,
        lead_account_id: None,
        placeholder: true,
    }
}

pub fn map_status(raw: Option<&RawNamedRef>) -> Status {
    let id = raw
        .and_then(|s| s.id.clone().or_else(|| s.name.clone()))
        .unwrap_or_else(|| UNKNOWN.to_string());

    Status {
        id,
        name: raw
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        description: raw.and_then(|s| s.description.clone()),
        status_category: raw
            .and_then(|s| s.status_category.clone())
            .unwrap_or_else(|| serde_json::json!({})),
    }
}

pub fn map_fix_version(raw: &RawFixVersion, project_id: &str) -> Option<FixVersion> {
    Some(FixVersion {
        id: raw.id.clone()?,
        name: raw.name.clone(),
        url: raw.url.clone(),
        description: raw.description.clone(),
        archived: raw.archived.unwrap_or(false),
        released: raw.released.unwrap_or(false),
        release_date: parse_datetime(raw.release_date.as_deref()),
        project_id: project_id.to_string(),
    })
}

pub fn map_component(raw: &RawComponent, issue_id: &str) -> Option<Component> {
    Some(Component {
        id: raw.id.clone()?,
        name: raw.name.clone(),
        description: raw.description.clone(),
        url: raw.url.clone(),
        issue_id: issue_id.to_string(),
    })
}

pub fn map_subtask(raw: &RawSubtask, issue_id: &str) -> Option<Subtask> {
    Some(Subtask {
        id: raw.id.clone()?,
        key: raw.key.clone(),
        name: raw.name.clone(),
        url: raw.url.clone(),
        issue_id: issue_id.to_string(),
    })
}

/// Custom fields captured verbatim; keys outside the reserved prefix or in
/// the exclusion list are dropped.
fn custom_fields(fields: &RawIssueFields) -> Value {
    let map: serde_json::Map<String, Value> = fields
        .extra
        .iter()
        .filter(|(key, _)| {
            key.starts_with("customfield_") && !EXCLUDED_CUSTOM_FIELDS.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(map)
}

/// Normalize one raw issue. Fails only when the record lacks the `id` it
/// needs to exist at all; every other absence degrades to a fallback or an
/// explicit null.
pub fn map_issue(raw: &RawIssue) -> SynclineResult<Issue> {
    let id = raw
        .id()
        .map(str::to_owned)
        .ok_or_else(|| SynclineError::MalformedRecord("issue without id".to_string()))?;
    let key = raw.key().map(str::to_owned).unwrap_or_else(|| id.clone());
    let fields = raw.fields();

    let project_key_fallback = key.split('-').next().unwrap_or(UNKNOWN).to_string();
    let project = fields.project.as_ref();
    let project_id = project
        .and_then(|p| p.id.clone().or_else(|| p.key.clone()))
        .unwrap_or_else(|| project_key_fallback.clone());
    let project_key = project
        .and_then(|p| p.key.clone())
        .unwrap_or(project_key_fallback);

    let created = parse_datetime(raw.created());
    let updated = parse_datetime(raw.updated());
    // Source rarely sets an explicit resolution timestamp; default to the
    // update timestamp so the column is never null when one exists.
    let resolved_date = parse_datetime(fields.resolution_date.as_deref()).or(updated);

    Ok(Issue {
        key,
        url: raw.url().map(str::to_owned),
        summary: fields.summary.clone().unwrap_or_default(),
        status_id: fields
            .status
            .as_ref()
            .and_then(|s| s.id.clone().or_else(|| s.name.clone()))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        status_name: fields.status.as_ref().and_then(|s| s.name.clone()),
        issue_type_id: fields
            .issuetype
            .as_ref()
            .and_then(|t| t.id.clone().or_else(|| t.name.clone())),
        priority_id: fields
            .priority
            .as_ref()
            .and_then(|p| p.id.clone().or_else(|| p.name.clone())),
        project_id,
        project_key,
        assignee_id: fields.assignee.as_ref().and_then(actor_id),
        assignee_name: fields
            .assignee
            .as_ref()
            .and_then(|a| a.display_name.clone()),
        reporter_id: fields.reporter.as_ref().and_then(actor_id),
        fix_version_id: fields
            .fix_versions
            .as_ref()
            .and_then(|versions| versions.first())
            .and_then(|v| v.id.clone()),
        created,
        updated,
        resolved_date,
        time_estimate: parse_seconds(fields.time_estimate.as_ref()),
        time_original_estimate: parse_seconds(fields.time_original_estimate.as_ref()),
        custom_fields: custom_fields(fields),
        id,
    })
}

pub fn map_changelog(entry: &RawChangelogEntry, issue_id: &str) -> Option<Changelog> {
    Some(Changelog {
        id: entry.id.clone()?,
        issue_id: issue_id.to_string(),
        created: parse_datetime(entry.created.as_deref()),
        author_id: entry.author.as_ref().and_then(actor_id),
        items: Value::Array(entry.items.clone()),
    })
}

fn body_text(body: &Value) -> Option<String> {
    match body {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => body
            .pointer("/view/value")
            .or_else(|| body.pointer("/storage/value"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| Some(body.to_string())),
        _ => None,
    }
}

pub fn map_comment(raw: &RawIssueComment, issue_id: &str) -> Option<IssueComment> {
    let created_at = parse_datetime(raw.created.as_deref());

    Some(IssueComment {
        comment_id: raw.id.clone()?,
        issue_id: issue_id.to_string(),
        body: raw.body.as_ref().and_then(body_text),
        author_id: raw.author.as_ref().and_then(actor_id),
        author_name: raw.author.as_ref().and_then(|a| a.display_name.clone()),
        created_at,
        updated_at: parse_datetime(raw.updated.as_deref()).or(created_at),
    })
}

/// Extract the full entity bundle of one raw issue: the issue row plus every
/// embedded child and referenced actor as independent normalized entities.
pub fn extract_bundle(
    raw: &RawIssue,
    raw_comments: &[RawIssueComment],
) -> SynclineResult<IssueBundle> {
    let issue = map_issue(raw)?;
    let fields = raw.fields();

    let mut users = Vec::new();
    if let Some(assignee) = &fields.assignee {
        users.push(map_user(assignee));
    }
    if let Some(reporter) = &fields.reporter {
        users.push(map_user(reporter));
    }

    let project = match &fields.project {
        Some(p) => map_project(p),
        None => placeholder_project(&issue.key),
    };
    let status = map_status(fields.status.as_ref());

    let fix_versions: Vec<FixVersion> = fields
        .fix_versions
        .iter()
        .flatten()
        .filter_map(|fv| map_fix_version(fv, &project.id))
        .collect();

    let components: Vec<Component> = fields
        .components
        .iter()
        .flatten()
        .filter_map(|c| map_component(c, &issue.id))
        .collect();

    let labels: Vec<IssueLabel> = fields
        .labels
        .iter()
        .flatten()
        .map(|label| IssueLabel {
            issue_id: issue.id.clone(),
            label_name: label.clone(),
        })
        .collect();

    let issue_fix_versions: Vec<IssueFixVersion> = fix_versions
        .iter()
        .map(|fv| IssueFixVersion {
            issue_id: issue.id.clone(),
            fix_version_id: fv.id.clone(),
        })
        .collect();

    let subtasks: Vec<Subtask> = fields
        .subtasks
        .iter()
        .flatten()
        .filter_map(|s| map_subtask(s, &issue.id))
        .collect();

    let changelogs: Vec<Changelog> = raw
        .changelog()
        .map(|log| {
            log.histories
                .iter()
                .filter_map(|entry| map_changelog(entry, &issue.id))
                .collect()
        })
        .unwrap_or_default();

    let comments: Vec<IssueComment> = raw_comments
        .iter()
        .filter_map(|c| map_comment(c, &issue.id))
        .collect();

    Ok(IssueBundle {
        issue,
        users,
        project,
        status,
        fix_versions,
        components,
        labels,
        issue_fix_versions,
        subtasks,
        changelogs,
        comments,
    })
}

/// Merge bundles into one batch. Sub-entities are deduplicated first-seen-
/// wins in arrival order; later duplicates in the same batch are discarded,
/// not merged. Issues are never deduplicated; duplicate keys are a data
/// error for the sink to surface.
pub fn collect_batch(bundles: Vec<IssueBundle>) -> TrackerBatch {
    let mut batch = TrackerBatch::default();
    let mut seen_users: HashSet<String> = HashSet::new();
    let mut seen_projects: HashSet<String> = HashSet::new();
    let mut seen_statuses: HashSet<String> = HashSet::new();
    let mut seen_fix_versions: HashSet<String> = HashSet::new();

    for bundle in bundles {
        batch.issues.push(bundle.issue);

        for user in bundle.users {
            if seen_users.insert(user.account_id.to_lowercase()) {
                batch.users.push(user);
            }
        }
        if seen_projects.insert(bundle.project.key.clone()) {
            batch.projects.push(bundle.project);
        }
        if seen_statuses.insert(bundle.status.id.clone()) {
            batch.statuses.push(bundle.status);
        }
        for fix_version in bundle.fix_versions {
            if seen_fix_versions.insert(fix_version.id.clone()) {
                batch.fix_versions.push(fix_version);
            }
        }

        batch.components.extend(bundle.components);
        batch.labels.extend(bundle.labels);
        batch.issue_fix_versions.extend(bundle.issue_fix_versions);
        batch.subtasks.extend(bundle.subtasks);
        batch.changelogs.extend(bundle.changelogs);
        batch.comments.extend(bundle.comments);
    }

    batch
}
