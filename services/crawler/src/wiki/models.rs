use serde::Deserialize;
use serde_json::Value;

/// A wiki actor as embedded in pages, versions and comments. Server-era
/// deployments carry `userKey`/`username`, cloud ones `accountId`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWikiActor {
    pub account_id: Option<String>,
    pub username: Option<String>,
    pub user_key: Option<String>,
    pub display_name: Option<String>,
    pub public_name: Option<String>,
    pub profile_picture: Option<RawProfilePicture>,
    pub account_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfilePicture {
    pub path: Option<String>,
}

/// One version entry: the actor, the timestamp, and the version number.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVersion {
    pub by: Option<RawWikiActor>,
    pub when: Option<String>,
    pub message: Option<String>,
    pub number: Option<i32>,
    pub minor_edit: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExpandable {
    pub homepage: Option<String>,
    pub container: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpace {
    pub id: Option<Value>,
    pub key: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub space_type: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "_expandable")]
    pub expandable: Option<RawExpandable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLinks {
    pub webui: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAncestor {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub status: Option<String>,
    pub title: Option<String>,
    pub space: Option<RawSpace>,
    pub version: Option<RawVersion>,
    pub author: Option<RawWikiActor>,
    pub created: Option<String>,
    pub ancestors: Option<Vec<RawAncestor>>,
    pub views: Option<i64>,
    pub url: Option<String>,
    #[serde(rename = "_links")]
    pub links: Option<RawLinks>,
}

/// A search hit: some tools wrap the page under `content`, others return it
/// bare at the hit level, with the space sometimes beside the wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSearchHit {
    Wrapped {
        content: RawPage,
        space: Option<RawSpace>,
    },
    Bare(RawPage),
}

impl RawSearchHit {
    pub fn space(&self) -> Option<&RawSpace> {
        match self {
            RawSearchHit::Wrapped { content, space } => {
                space.as_ref().or(content.space.as_ref())
            }
            RawSearchHit::Bare(page) => page.space.as_ref(),
        }
    }

    pub fn into_page(self) -> RawPage {
        match self {
            RawSearchHit::Wrapped { content, .. } => content,
            RawSearchHit::Bare(page) => page,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchResult {
    #[serde(default)]
    pub results: Vec<RawSearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLabel {
    pub name: Option<String>,
    pub label: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWikiComment {
    pub id: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub author: Option<RawWikiActor>,
    pub version: Option<RawVersion>,
    pub body: Option<Value>,
    pub created: Option<String>,
    pub updated: Option<String>,
    #[serde(rename = "_expandable")]
    pub expandable: Option<RawExpandable>,
}

/// Version history of one page; `size` is the total version count used for
/// the contributors already-in-sync check.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVersionHistory {
    #[serde(default)]
    pub results: Vec<RawVersion>,
    pub size: Option<i64>,
}

/// Per-user view aggregate for one page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPageView {
    pub user_key: Option<String>,
    pub views: Option<i64>,
    pub last_view_date_formatted: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawViewHistory {
    #[serde(default)]
    pub results: Vec<RawPageView>,
}

/// One individual visit event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVisit {
    pub visit_date: Option<String>,
    pub last_visit: Option<String>,
}
