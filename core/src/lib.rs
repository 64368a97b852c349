//! Client core for SharePoint's REST API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). `RequestExecutor` layers an
//! async `Transport` on top for callers that want the round-trip done for
//! them, including the two-step compositions and bulk uploads.
//!
//! # Design
//! - `SharePointClient` is stateless; it holds only a `SiteContext`.
//! - The site address and the request digest are injected through
//!   `SiteContext`, never read from ambient state.
//! - Every URL passes through `RequestDescriptor`, which quotes OData
//!   literals and percent-encodes paths and query values.
//! - Errors are surfaced as `ApiError` unchanged; nothing is retried.

pub mod client;
pub mod context;
pub mod error;
pub mod executor;
pub mod http;
pub mod notify;
pub mod odata;
pub mod request;
pub mod transport;
pub mod types;
pub mod upload;

pub use client::SharePointClient;
pub use context::{DigestSource, FixedDigest, SiteContext};
pub use error::ApiError;
pub use executor::RequestExecutor;
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse};
pub use notify::{Confirm, Notifier, TracingNotifier};
pub use odata::{list_item_type_name, QueryOptions, DOCUMENT_SET_CONTENT_TYPE};
pub use request::{RequestDescriptor, Verb};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    group_titles, EntityMetadata, FileCopy, FolderCreation, FolderFilesQuery, ItemFields,
    ListItemUpdate, ListItemsQuery, SiteGroup, SiteUser, ViewRef,
};
pub use upload::{BatchOutcome, BatchReport, LocalFile, UploadFailure, UploadTally};
