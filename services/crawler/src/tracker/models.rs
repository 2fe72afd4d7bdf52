use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// An actor embedded in tracker payloads (assignee, reporter, lead,
/// changelog author). Older deployments identify users by `name`/`username`,
/// newer ones by `accountId`; all fields optional, resolved through the
/// mapper's fallback chain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActor {
    pub account_id: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
    pub active: Option<bool>,
}

/// `{id, name}`-shaped reference (status, priority, issue type).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNamedRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status_category: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProject {
    pub id: Option<String>,
    pub key: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "self")]
    pub url: Option<String>,
    pub project_type: Option<String>,
    pub description: Option<String>,
    pub lead: Option<RawActor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComponent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "self")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFixVersion {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "self")]
    pub url: Option<String>,
    pub description: Option<String>,
    pub archived: Option<bool>,
    pub released: Option<bool>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubtask {
    pub id: Option<String>,
    pub key: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "self")]
    pub url: Option<String>,
}

/// The field block of an issue. Unknown keys land in `extra`, from which the
/// mapper captures the reserved custom-field namespace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssueFields {
    pub summary: Option<String>,
    pub status: Option<RawNamedRef>,
    pub issuetype: Option<RawNamedRef>,
    pub priority: Option<RawNamedRef>,
    pub assignee: Option<RawActor>,
    pub reporter: Option<RawActor>,
    pub project: Option<RawProject>,
    pub labels: Option<Vec<String>>,
    pub components: Option<Vec<RawComponent>>,
    pub fix_versions: Option<Vec<RawFixVersion>>,
    pub subtasks: Option<Vec<RawSubtask>>,
    pub created: Option<String>,
    pub updated: Option<String>,
    #[serde(rename = "resolutiondate")]
    pub resolution_date: Option<String>,
    #[serde(rename = "timeestimate")]
    pub time_estimate: Option<Value>,
    #[serde(rename = "timeoriginalestimate")]
    pub time_original_estimate: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A raw issue record. The source emits two shapes, an envelope form with a
/// `fields` block and a flat form carrying field data at the top level,
/// discriminated here by the presence of `fields`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawIssue {
    Enveloped(EnvelopedIssue),
    Flat(FlatIssue),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopedIssue {
    pub id: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "self")]
    pub url: Option<String>,
    pub fields: RawIssueFields,
    pub changelog: Option<RawChangelog>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatIssue {
    pub id: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "self")]
    pub url: Option<String>,
    pub changelog: Option<RawChangelog>,
    #[serde(flatten)]
    pub fields: RawIssueFields,
}

impl RawIssue {
    pub fn id(&self) -> Option<&str> {
        match self {
            RawIssue::Enveloped(e) => e.id.as_deref(),
            RawIssue::Flat(f) => f.id.as_deref(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            RawIssue::Enveloped(e) => e.key.as_deref(),
            RawIssue::Flat(f) => f.key.as_deref(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            RawIssue::Enveloped(e) => e.url.as_deref(),
            RawIssue::Flat(f) => f.url.as_deref(),
        }
    }

    pub fn fields(&self) -> &RawIssueFields {
        match self {
            RawIssue::Enveloped(e) => &e.fields,
            RawIssue::Flat(f) => &f.fields,
        }
    }

    pub fn changelog(&self) -> Option<&RawChangelog> {
        match self {
            RawIssue::Enveloped(e) => e.changelog.as_ref(),
            RawIssue::Flat(f) => f.changelog.as_ref(),
        }
    }

    /// `fields.created`, falling back to the record's own top-level field.
    pub fn created(&self) -> Option<&str> {
        match self {
            RawIssue::Enveloped(e) => e.fields.created.as_deref().or(e.created.as_deref()),
            RawIssue::Flat(f) => f.fields.created.as_deref(),
        }
    }

    /// `fields.updated`, falling back to the record's own top-level field.
    pub fn updated(&self) -> Option<&str> {
        match self {
            RawIssue::Enveloped(e) => e.fields.updated.as_deref().or(e.updated.as_deref()),
            RawIssue::Flat(f) => f.fields.updated.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChangelog {
    #[serde(default)]
    pub histories: Vec<RawChangelogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChangelogEntry {
    pub id: Option<String>,
    pub author: Option<RawActor>,
    pub created: Option<String>,
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssueComment {
    pub id: Option<String>,
    pub author: Option<RawActor>,
    pub body: Option<Value>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

/// One page of a project's issue listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssuePage {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}
