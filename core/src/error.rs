//! Error types for the SharePoint REST client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the list/file does not exist" from "the server rejected the request."
//! All other non-2xx responses land in `HttpError` with the raw status code
//! and body. Nothing here is retryable and nothing is reinterpreted; the
//! server's error payload reaches the caller unchanged.

use serde::Deserialize;

/// Errors returned by the builders, the parsers and the executor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A mutating request was built while no request digest was available.
    #[error("no request digest available for a mutating request")]
    MissingRequestDigest,

    /// A caller-supplied value cannot be expressed on the wire.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// A local file could not be read.
    #[error("io error: {0}")]
    Io(String),

    /// Environment configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }

    /// The human-readable message of an OData error body, if there is one.
    ///
    /// SharePoint reports failures as
    /// `{"error":{"code":"...","message":{"lang":"en-US","value":"..."}}}`.
    pub fn server_message(&self) -> Option<String> {
        let ApiError::HttpError { body, .. } = self else {
            return None;
        };
        let parsed: ODataErrorBody = serde_json::from_str(body).ok()?;
        Some(parsed.error.message.value)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Io(err.to_string())
    }
}

#[derive(Deserialize)]
struct ODataErrorBody {
    error: ODataError,
}

#[derive(Deserialize)]
struct ODataError {
    message: ODataErrorMessage,
}

#[derive(Deserialize)]
struct ODataErrorMessage {
    value: String,
}
