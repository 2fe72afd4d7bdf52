use std::collections::HashSet;

use serde_json::Value;

use syncline_common::error::{SynclineError, SynclineResult};
use syncline_db::wiki::models::{
    Contributor, Page, Space, View, VisitHistory, WikiComment, WikiLabel, WikiUser,
};

use crate::time::parse_datetime;

use super::models::{
    RawLabel, RawPage, RawPageView, RawSpace, RawVersion, RawVisit, RawWikiActor, RawWikiComment,
};

const UNKNOWN: &str = "unknown";

/// All extracted entities of one raw page.
#[derive(Debug)]
pub struct PageBundle {
    pub page: Page,
    pub users: Vec<WikiUser>,
    pub space: Option<Space>,
}

/// One space worth of bundles merged into per-type lists, users and spaces
/// deduplicated first-seen-wins.
#[derive(Debug, Default)]
pub struct WikiBatch {
    pub pages: Vec<Page>,
    pub users: Vec<WikiUser>,
    pub spaces: Vec<Space>,
}

/// Primary identifier: canonical account id, then the name aliases.
fn actor_user_id(actor: &RawWikiActor) -> String {
    actor
        .account_id
        .clone()
        .or_else(|| actor.username.clone())
        .or_else(|| actor.display_name.clone())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Join key: the server-era user key first, then the same chain as the
/// primary identifier. Never empty; downstream joins need a value.
pub fn actor_user_key(actor: &RawWikiActor) -> String {
    actor
        .user_key
        .clone()
        .or_else(|| actor.account_id.clone())
        .or_else(|| actor.username.clone())
        .or_else(|| actor.display_name.clone())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn map_user(actor: &RawWikiActor) -> WikiUser {
    let display_name = actor
        .display_name
        .clone()
        .or_else(|| actor.public_name.clone())
        .unwrap_or_else(|| "Unknown User".to_string());
    // Resignation heuristic: deactivated account, or the source has replaced
    // the name with its "Unknown" marker.
    let is_resigned =
        actor.account_status.as_deref() == Some("inactive") || display_name.contains("Unknown");

    WikiUser {
        user_id: actor_user_id(actor),
        user_key: actor_user_key(actor),
        display_name,
        avatar_url: actor
            .profile_picture
            .as_ref()
            .and_then(|p| p.path.clone()),
        roles: None,
        english_name: None,
        is_resigned,
    }
}

pub fn map_space(raw: &RawSpace) -> Option<Space> {
    let space_key = raw.key.clone()?;

    let space_id = match &raw.id {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0".to_string(),
    };

    Some(Space {
        space_id,
        space_key,
        space_name: raw.name.clone().unwrap_or_default(),
        space_type: raw
            .space_type
            .clone()
            .unwrap_or_else(|| "global".to_string()),
        status: raw.status.clone().unwrap_or_else(|| "current".to_string()),
        description: None,
        homepage_id: raw
            .expandable
            .as_ref()
            .and_then(|e| e.homepage.as_deref())
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_owned),
    })
}

/// Normalize one raw page. Fails only when the record lacks the `id` it
/// needs to exist at all. Surrogate author keys are left unresolved here;
/// the assembler fills them once user rows are persisted.
pub fn map_page(raw: &RawPage) -> SynclineResult<Page> {
    let page_id = raw
        .id
        .clone()
        .ok_or_else(|| SynclineError::MalformedRecord("page without id".to_string()))?;

    let version = raw.version.as_ref();
    let version_number = version.and_then(|v| v.number).unwrap_or(1);
    let modified_at = parse_datetime(version.and_then(|v| v.when.as_deref()));

    let ancestor_ids: Vec<String> = raw
        .ancestors
        .iter()
        .flatten()
        .filter_map(|a| a.id.clone())
        .collect();

    Ok(Page {
        page_id,
        title: raw.title.clone().unwrap_or_default(),
        url: raw
            .links
            .as_ref()
            .and_then(|l| l.webui.clone())
            .or_else(|| raw.url.clone())
            .unwrap_or_default(),
        views: raw.views.unwrap_or(0),
        last_modified_by: version
            .and_then(|v| v.by.as_ref())
            .and_then(|by| by.display_name.clone())
            .unwrap_or_default(),
        last_modified_by_key: version.and_then(|v| v.by.as_ref()).map(actor_user_key),
        last_modified_by_id: None,
        created_by_display_name: raw.author.as_ref().and_then(|a| a.display_name.clone()),
        created_by_key: raw.author.as_ref().map(actor_user_key),
        created_by_id: None,
        number_of_versions: version_number,
        parent_page_ids: if ancestor_ids.is_empty() {
            None
        } else {
            Some(ancestor_ids.join(","))
        },
        nearest_parent_id: ancestor_ids.first().cloned(),
        created_at: parse_datetime(raw.created.as_deref()).or(modified_at),
        space_key: raw.space.as_ref().and_then(|s| s.key.clone()),
        content_type: raw
            .content_type
            .clone()
            .unwrap_or_else(|| "page".to_string()),
        status: raw.status.clone().unwrap_or_else(|| "current".to_string()),
        version_number,
        last_modified_at: modified_at,
    })
}

pub fn map_label(page_id: &str, raw: &RawLabel) -> Option<WikiLabel> {
    let label_name = raw
        .name
        .clone()
        .or_else(|| raw.label.clone())
        .filter(|name| !name.is_empty())?;

    Some(WikiLabel {
        page_id: page_id.to_string(),
        label_name,
        label_prefix: raw.prefix.clone(),
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

pub fn map_comment(raw: &RawWikiComment, page_id: Option<&str>) -> Option<WikiComment> {
    let comment_id = raw.id.clone()?;
    let page_id = page_id
        .map(str::to_owned)
        .or_else(|| {
            raw.expandable
                .as_ref()
                .and_then(|e| e.container.as_deref())
                .and_then(|path| path.rsplit('/').next())
                .map(str::to_owned)
        })
        .unwrap_or_default();

    let version = raw.version.as_ref();
    let version_when = parse_datetime(version.and_then(|v| v.when.as_deref()));

    // Author resolution: the comment's own author first, then the version
    // actor; dates fall back to the version timestamp the same way.
    let author = raw.author.as_ref();
    let version_by = version.and_then(|v| v.by.as_ref());
    let author_user_key = author.or(version_by).map(actor_user_key);
    let assignee_code = author
        .and_then(|a| a.username.clone())
        .or_else(|| author.map(actor_user_key))
        .or_else(|| author_user_key.clone());

    Some(WikiComment {
        comment_id,
        page_id,
        comment_title: raw.title.clone(),
        comment_body: raw.body.as_ref().and_then(body_text),
        author_user_key,
        assignee_code,
        display_name: author.and_then(|a| a.display_name.clone()),
        created_at: parse_datetime(raw.created.as_deref()).or(version_when),
        updated_at: parse_datetime(raw.updated.as_deref()).or(version_when),
        version_number: version.and_then(|v| v.number).unwrap_or(1),
        status: raw.status.clone().unwrap_or_else(|| "current".to_string()),
    })
}

pub fn map_view(page_id: &str, raw: &RawPageView) -> Option<View> {
    Some(View {
        page_id: page_id.to_string(),
        user_key: raw.user_key.clone()?,
        total: raw.views.unwrap_or(0),
        last_view: parse_datetime(raw.last_view_date_formatted.as_deref()),
    })
}

pub fn map_contributor(page_id: &str, version: &RawVersion) -> Option<Contributor> {
    let by = version.by.as_ref()?;
    let number = version.number?;

    Some(Contributor {
        page_id: page_id.to_string(),
        user_key: actor_user_key(by),
        version: number,
        when_modified: parse_datetime(version.when.as_deref()),
        message: version.message.clone(),
        minor_edit: version.minor_edit.unwrap_or(false),
    })
}

pub fn map_visit(views_id: i64, visit: &RawVisit) -> VisitHistory {
    let visit_date = visit.visit_date.clone().unwrap_or_default();
    let unix_date =
        parse_datetime(Some(visit_date.as_str())).map(|dt| dt.timestamp().to_string());

    VisitHistory {
        views_id,
        visit_date,
        unix_date,
        visit_timestamp: parse_datetime(visit.last_visit.as_deref()),
    }
}

/// Extract the entity bundle of one raw page: the page row plus its actor
/// entities (version author, creator) and embedded space.
pub fn extract_bundle(raw: &RawPage) -> SynclineResult<PageBundle> {
    let page = map_page(raw)?;

    let mut users = Vec::new();
    if let Some(by) = raw.version.as_ref().and_then(|v| v.by.as_ref()) {
        users.push(map_user(by));
    }
    if let Some(author) = raw.author.as_ref() {
        users.push(map_user(author));
    }
    let users = dedup_users(users);

    Ok(PageBundle {
        page,
        users,
        space: raw.space.as_ref().and_then(map_space),
    })
}

/// First-seen-wins by case-folded user key, preserving arrival order.
pub fn dedup_users(users: Vec<WikiUser>) -> Vec<WikiUser> {
    let mut seen: HashSet<String> = HashSet::new();
    users
        .into_iter()
        .filter(|user| seen.insert(user.user_key.to_lowercase()))
        .collect()
}

/// Merge bundles into one batch: pages kept one row per record, users and
/// spaces deduplicated first-seen-wins in arrival order.
pub fn collect_batch(bundles: Vec<PageBundle>) -> WikiBatch {
    let mut batch = WikiBatch::default();
    let mut seen_users: HashSet<String> = HashSet::new();
    let mut seen_spaces: HashSet<String> = HashSet::new();

    for bundle in bundles {
        batch.pages.push(bundle.page);

        for user in bundle.users {
            if seen_users.insert(user.user_key.to_lowercase()) {
                batch.users.push(user);
            }
        }
        if let Some(space) = bundle.space {
            if seen_spaces.insert(space.space_key.clone()) {
                batch.spaces.push(space);
            }
        }
    }

    batch
}
