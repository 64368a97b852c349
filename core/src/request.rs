//! Request descriptor: the single construction path every operation uses.
//!
//! A descriptor is built fresh per call and consumed by `build()`, which
//! assembles the URL and finalizes the headers.

use serde::Serialize;

use crate::error::ApiError;
use crate::http::{Body, HttpMethod, HttpRequest};
use crate::odata::{encode_path, QueryOptions};

pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const REQUEST_DIGEST: &str = "X-RequestDigest";
pub const HTTP_METHOD: &str = "X-HTTP-Method";
pub const IF_MATCH: &str = "If-Match";
pub const SLUG: &str = "Slug";

pub const ODATA_VERBOSE: &str = "application/json;odata=verbose";
/// Precondition that matches any current version.
pub const MATCH_ANY: &str = "*";

/// Semantic verb. `Merge` and `Delete` are tunnelled through `POST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Merge,
    Delete,
}

impl Verb {
    pub fn wire_method(self) -> HttpMethod {
        match self {
            Verb::Get => HttpMethod::Get,
            Verb::Post | Verb::Merge | Verb::Delete => HttpMethod::Post,
        }
    }

    fn method_override(self) -> Option<&'static str> {
        match self {
            Verb::Merge => Some("MERGE"),
            Verb::Delete => Some("DELETE"),
            Verb::Get | Verb::Post => None,
        }
    }

    pub fn is_mutating(self) -> bool {
        !matches!(self, Verb::Get)
    }
}

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    base: String,
    path: String,
    verb: Verb,
    headers: Vec<(String, String)>,
    body: Option<Body>,
    query: QueryOptions,
    path_encoded: bool,
}

impl RequestDescriptor {
    /// `base` is used verbatim; `path` is raw and gets percent-encoded on
    /// `build()`.
    pub fn new(verb: Verb, base: &str, path: impl Into<String>) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            path: path.into(),
            verb,
            headers: vec![(ACCEPT.to_string(), ODATA_VERBOSE.to_string())],
            body: None,
            query: QueryOptions::default(),
            path_encoded: false,
        }
    }

    /// `path` is already percent-encoded and is used verbatim.
    pub fn path_encoded(mut self) -> Self {
        self.path_encoded = true;
        self
    }

    /// Set a header, replacing any existing one with the same name.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
        self
    }

    pub fn query(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    pub fn request_digest(self, digest: impl Into<String>) -> Self {
        self.header(REQUEST_DIGEST, digest)
    }

    /// Explicit concurrency token. Without one, `Merge` and `Delete` send
    /// `If-Match: *`.
    pub fn if_match(self, etag: impl Into<String>) -> Self {
        self.header(IF_MATCH, etag)
    }

    pub fn json_body<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self, ApiError> {
        let text =
            serde_json::to_string(payload).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.body = Some(Body::Json(text));
        Ok(self.header(CONTENT_TYPE, ODATA_VERBOSE))
    }

    pub fn binary_body(mut self, bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        self.body = Some(Body::Binary(bytes));
        self.header(CONTENT_LENGTH, len.to_string())
    }

    pub fn url(&self) -> String {
        let path = if self.path_encoded {
            self.path.clone()
        } else {
            encode_path(&self.path)
        };
        format!("{}{}{}", self.base, path, self.query.to_query_string())
    }

    pub fn build(mut self) -> Result<HttpRequest, ApiError> {
        if let Some(method) = self.verb.method_override() {
            self = self.header(HTTP_METHOD, method);
            if !self.headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(IF_MATCH)) {
                self = self.header(IF_MATCH, MATCH_ANY);
            }
        }
        if let Some((name, _)) = self
            .headers
            .iter()
            .find(|(_, value)| value.chars().any(|c| c.is_control()))
        {
            return Err(ApiError::InvalidInput(format!(
                "header {name} contains control characters"
            )));
        }

        let url = self.url();
        Ok(HttpRequest {
            method: self.verb.wire_method(),
            url,
            headers: self.headers,
            body: self.body,
        })
    }
}
