//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! A `Transport` turns one plain-data request into one plain-data response.
//! Non-2xx statuses are data, not errors; only failures that prevent a
//! response (DNS, TLS, connection reset) become `ApiError::Transport`.
//! Status interpretation stays in `SharePointClient::parse_*`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse};
use crate::request::CONTENT_LENGTH;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request).await
    }
}

/// `Transport` backed by a shared `reqwest::Client`.
///
/// Authentication cookies or default headers belong on the `reqwest::Client`
/// passed to `with_client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            // reqwest derives the length from the body.
            if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(Body::Json(text)) => builder.body(text),
            Some(Body::Binary(bytes)) => builder.body(bytes),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}
