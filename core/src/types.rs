//! Operation inputs and the response shapes the parsers decode.
//!
//! # Design
//! Responses use SharePoint's `odata=verbose` envelope: single entities
//! arrive as `{"d": {...}}` and collections as `{"d": {"results": [...]}}`.
//! Most payloads stay opaque (`serde_json::Value`) because their shape
//! depends on the list schema; only the fields the client itself reads are
//! typed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::odata::QueryOptions;

/// Item query against a list (`.../items?$select=*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListItemsQuery {
    pub list_name: String,
    #[serde(default)]
    pub site_url: Option<String>,
    /// Appended to the default `*` selection, e.g. `"Author/Title"`.
    #[serde(default)]
    pub select_lookup: Option<String>,
    #[serde(default)]
    pub expand_lookup: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
}

impl ListItemsQuery {
    pub fn new(list_name: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            ..Self::default()
        }
    }

    pub fn site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    pub fn select_lookup(mut self, fields: impl Into<String>) -> Self {
        self.select_lookup = Some(fields.into());
        self
    }

    pub fn expand_lookup(mut self, relations: impl Into<String>) -> Self {
        self.expand_lookup = Some(relations.into());
        self
    }

    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter = Some(expression.into());
        self
    }

    pub fn order_by(mut self, expression: impl Into<String>) -> Self {
        self.order_by = Some(expression.into());
        self
    }

    pub(crate) fn options(&self) -> QueryOptions {
        QueryOptions::new()
            .select("*")
            .select_opt(self.select_lookup.as_deref())
            .expand_opt(self.expand_lookup.as_deref())
            .filter(self.filter.as_deref())
            .order_by(self.order_by.as_deref())
    }
}

/// File listing of a folder (`.../Files?$select=*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderFilesQuery {
    /// Server-relative folder URL, e.g. `/sites/a/Shared Documents`.
    pub folder_url: String,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub select_lookup: Option<String>,
    #[serde(default)]
    pub expand_lookup: Option<String>,
}

impl FolderFilesQuery {
    pub fn new(folder_url: impl Into<String>) -> Self {
        Self {
            folder_url: folder_url.into(),
            ..Self::default()
        }
    }

    pub(crate) fn options(&self) -> QueryOptions {
        QueryOptions::new()
            .select("*")
            .select_opt(self.select_lookup.as_deref())
            .expand_opt(self.expand_lookup.as_deref())
    }
}

/// Field updates for one list item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListItemUpdate {
    pub list_name: String,
    pub item_id: u64,
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub site_url: Option<String>,
    /// Concurrency token; `If-Match: *` when absent.
    #[serde(default)]
    pub etag: Option<String>,
}

/// A view of a list, addressed by titles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewRef {
    #[serde(default)]
    pub site_url: Option<String>,
    pub list_name: String,
    pub view_title: String,
}

/// A folder (or document set) to create inside a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderCreation {
    #[serde(default)]
    pub site_url: Option<String>,
    pub list_name: String,
    pub folder_name: String,
    pub content_type_id: String,
}

/// Server-side copy of a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileCopy {
    #[serde(default)]
    pub site_url: Option<String>,
    pub source_url: String,
    pub destination_url: String,
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct Verbose<T> {
    pub d: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewQueryResult {
    #[serde(rename = "ViewQuery")]
    pub view_query: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RootFolder {
    #[serde(rename = "ServerRelativeUrl")]
    pub server_relative_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecycleResult {
    #[serde(rename = "Recycle")]
    pub recycle: uuid::Uuid,
}

/// `__metadata` block of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// The list item behind a file, with its concurrency metadata split out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemFields {
    #[serde(rename = "__metadata")]
    pub metadata: EntityMetadata,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteUser {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub login_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_site_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteGroup {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Titles of `groups`, in server order.
pub fn group_titles(groups: &[SiteGroup]) -> Vec<String> {
    groups.iter().map(|g| g.title.clone()).collect()
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CamlQueryPayload {
    pub query: CamlQuery,
}

#[derive(Debug, Serialize)]
pub(crate) struct CamlQuery {
    #[serde(rename = "__metadata")]
    pub metadata: TypeTag,
    #[serde(rename = "ViewXml")]
    pub view_xml: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TypeTag {
    #[serde(rename = "type")]
    pub entity_type: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FolderPayload<'a> {
    #[serde(rename = "Title")]
    pub title: &'a str,
    #[serde(rename = "Path")]
    pub path: &'a str,
}
