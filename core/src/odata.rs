//! OData URL grammar: string literals, query options and entity type names.
//!
//! # Design
//! Resource paths are assembled from fixed templates plus caller values
//! wrapped as OData literals (`'value'`, embedded quotes doubled). The whole
//! path is then percent-encoded once, keeping the characters the OData path
//! grammar needs (`/ ' ( ) , = : * $ @`) and encoding everything that would
//! change the meaning of the URL (`? # %` and friends). Query option values
//! additionally encode `& + =` so a filter cannot smuggle in a new option.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::ApiError;

const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

const QUERY_VALUE: &AsciiSet = &PATH.add(b'&').add(b'+').add(b'=');

/// A single path segment: `/` must not survive.
const SEGMENT: &AsciiSet = &PATH.add(b'/');

/// Content type id of a document set.
pub const DOCUMENT_SET_CONTENT_TYPE: &str = "0x0120D520";

/// Wrap `value` as an OData string literal.
pub fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH).to_string()
}

pub(crate) fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Encode `value` as one path segment. `.` and `..` are rejected since URL
/// parsers collapse them even when percent-encoded.
pub(crate) fn encode_segment(value: &str) -> Result<String, ApiError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(ApiError::InvalidInput(format!("'{value}' is not a valid path segment")));
    }
    Ok(utf8_percent_encode(value, SEGMENT).to_string())
}

/// Encode one half of a `Slug` header (RFC 5023 §9.7). `|` and `%` are
/// encoded, so the only literal `|` is the url/content-type separator.
pub(crate) fn encode_slug_part(value: &str) -> String {
    utf8_percent_encode(value, PATH).to_string()
}

/// Entity type name SharePoint expects in `__metadata.type` when writing
/// items of the list titled `list_name`.
///
/// `"Tasks"` becomes `"SP.Data.TasksListItem"` and `"Project Tasks"`
/// becomes `"SP.Data.ProjectTasksListItem"`.
pub fn list_item_type_name(list_name: &str) -> String {
    let first: String = list_name
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default();
    let rest: String = list_name.split(' ').collect::<String>().chars().skip(1).collect();
    format!("SP.Data.{first}{rest}ListItem")
}

/// OData query modifiers, emitted as `$select`, `$expand`, `$filter`,
/// `$orderby` and then any extra parameters, in that order.
///
/// Empty strings are ignored everywhere, so an empty modifier produces the
/// same URL as an absent one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    select: Vec<String>,
    expand: Vec<String>,
    filter: Option<String>,
    order_by: Option<String>,
    params: Vec<(String, String)>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, fields: impl AsRef<str>) -> Self {
        if let Some(fields) = non_empty(Some(fields.as_ref())) {
            self.select.push(fields.to_string());
        }
        self
    }

    pub fn select_opt(self, fields: Option<&str>) -> Self {
        match non_empty(fields) {
            Some(fields) => self.select(fields),
            None => self,
        }
    }

    pub fn expand(mut self, relations: impl AsRef<str>) -> Self {
        if let Some(relations) = non_empty(Some(relations.as_ref())) {
            self.expand.push(relations.to_string());
        }
        self
    }

    pub fn expand_opt(self, relations: Option<&str>) -> Self {
        match non_empty(relations) {
            Some(relations) => self.expand(relations),
            None => self,
        }
    }

    pub fn filter(mut self, expression: Option<&str>) -> Self {
        self.filter = non_empty(expression).map(str::to_string);
        self
    }

    pub fn order_by(mut self, expression: Option<&str>) -> Self {
        self.order_by = non_empty(expression).map(str::to_string);
        self
    }

    /// Extra parameter such as a `@target` alias.
    pub fn param(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
        if let Some(value) = non_empty(Some(value.as_ref())) {
            self.params.push((name.into(), value.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.select.is_empty()
            && self.expand.is_empty()
            && self.filter.is_none()
            && self.order_by.is_none()
            && self.params.is_empty()
    }

    /// Encoded query string including the leading `?`, or `""` when empty.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.select.is_empty() {
            parts.push(format!("$select={}", encode_query_value(&self.select.join(","))));
        }
        if !self.expand.is_empty() {
            parts.push(format!("$expand={}", encode_query_value(&self.expand.join(","))));
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("$filter={}", encode_query_value(filter)));
        }
        if let Some(order_by) = &self.order_by {
            parts.push(format!("$orderby={}", encode_query_value(order_by)));
        }
        for (name, value) in &self.params {
            parts.push(format!("{}={}", encode_query_value(name), encode_query_value(value)));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }
}
