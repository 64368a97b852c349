//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! builders on `SharePointClient` produce `HttpRequest` values and the
//! parsers consume `HttpResponse` values without touching the network. A
//! `Transport` (or any host) executes the actual round-trip.
//!
//! SharePoint only ever sees `GET` and `POST` on the wire. The semantic verb
//! of a `MERGE` or `DELETE` travels in the `X-HTTP-Method` header, which is
//! why `HttpMethod` has just two variants.

/// HTTP method as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Serialized JSON text (`odata=verbose` flavour).
    Json(String),
    /// Raw bytes, sent as-is. Used for file uploads.
    Binary(Vec<u8>),
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Json(text) => text.len(),
            Body::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The JSON text, if this is a JSON body.
    pub fn as_json(&self) -> Option<&str> {
        match self {
            Body::Json(text) => Some(text),
            Body::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Json(text) => text.into_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is fully qualified and already percent-encoded. `headers` keeps
/// insertion order and never contains the same name twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`, then
/// passed to the `SharePointClient::parse_*` methods.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
