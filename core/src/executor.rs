//! Async executor: builds a request, sends it through a `Transport`, parses
//! the response.
//!
//! # Design
//! Every method is exactly `build_*` → `Transport::execute` → `parse_*`. The
//! two-step compositions (root folder → create folder, item fields → MERGE,
//! view query → items) await the first step and only then build the
//! second, so a failed first step returns its error and the second request
//! never exists.

use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::SharePointClient;
use crate::context::SiteContext;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::notify::Confirm;
use crate::odata::DOCUMENT_SET_CONTENT_TYPE;
use crate::request::Verb;
use crate::transport::Transport;
use crate::types::{
    FileCopy, FolderCreation, FolderFilesQuery, ItemFields, ListItemUpdate, ListItemsQuery,
    SiteGroup, SiteUser, ViewRef,
};

pub struct RequestExecutor<T> {
    client: SharePointClient,
    transport: T,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(context: SiteContext, transport: T) -> Self {
        Self {
            client: SharePointClient::new(context),
            transport,
        }
    }

    pub fn client(&self) -> &SharePointClient {
        &self.client
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let verb = request.header(crate::request::HTTP_METHOD).unwrap_or(request.method.as_str());
        debug!(%verb, url = %request.url, "sending request");
        let response = self.transport.execute(request).await?;
        if response.is_success() {
            debug!(status = response.status, "response received");
        } else {
            warn!(status = response.status, "request failed");
        }
        Ok(response)
    }

    pub async fn list_items(&self, query: &ListItemsQuery) -> Result<Vec<Value>, ApiError> {
        let response = self.send(self.client.build_list_items(query)?).await?;
        self.client.parse_list_items(response)
    }

    pub async fn view_query(&self, view: &ViewRef) -> Result<String, ApiError> {
        let response = self.send(self.client.build_view_query(view)?).await?;
        self.client.parse_view_query(response)
    }

    pub async fn items_by_caml(
        &self,
        site_url: Option<&str>,
        list_name: &str,
        caml: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let response = self
            .send(self.client.build_items_by_caml(site_url, list_name, caml)?)
            .await?;
        self.client.parse_items_by_caml(response)
    }

    /// Items as the named view would show them.
    pub async fn list_items_for_view(&self, view: &ViewRef) -> Result<Vec<Value>, ApiError> {
        let caml = self.view_query(view).await?;
        self.items_by_caml(view.site_url.as_deref(), &view.list_name, &caml)
            .await
    }

    pub async fn update_list_item(&self, update: &ListItemUpdate) -> Result<(), ApiError> {
        let response = self.send(self.client.build_update_list_item(update)?).await?;
        self.client.parse_update_list_item(response)
    }

    pub async fn folder_files(&self, query: &FolderFilesQuery) -> Result<Vec<Value>, ApiError> {
        let response = self.send(self.client.build_folder_files(query)?).await?;
        self.client.parse_folder_files(response)
    }

    pub async fn list_root_folder(&self, site_url: Option<&str>, list_name: &str) -> Result<String, ApiError> {
        let response = self
            .send(self.client.build_list_root_folder(site_url, list_name)?)
            .await?;
        self.client.parse_list_root_folder(response)
    }

    /// Resolve the list's root folder, then create `folder` under it.
    pub async fn create_folder(&self, folder: &FolderCreation) -> Result<Value, ApiError> {
        let list_url = self
            .list_root_folder(folder.site_url.as_deref(), &folder.list_name)
            .await?;
        let response = self
            .send(self.client.build_create_folder(folder, &list_url)?)
            .await?;
        self.client.parse_create_folder(response)
    }

    pub async fn create_document_set(
        &self,
        site_url: Option<&str>,
        list_name: &str,
        name: &str,
    ) -> Result<Value, ApiError> {
        self.create_folder(&FolderCreation {
            site_url: site_url.map(str::to_string),
            list_name: list_name.to_string(),
            folder_name: name.to_string(),
            content_type_id: DOCUMENT_SET_CONTENT_TYPE.to_string(),
        })
        .await
    }

    pub async fn file_item_fields(&self, site_url: Option<&str>, file_url: &str) -> Result<ItemFields, ApiError> {
        let response = self
            .send(self.client.build_file_item_fields(site_url, file_url)?)
            .await?;
        self.client.parse_file_item_fields(response)
    }

    /// Read the file's etag and entity type, then MERGE `properties` guarded
    /// by that etag.
    pub async fn update_file_properties(
        &self,
        site_url: Option<&str>,
        file_url: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), ApiError> {
        let current = self.file_item_fields(site_url, file_url).await?;
        let response = self
            .send(
                self.client
                    .build_update_file_properties(site_url, file_url, &current, properties)?,
            )
            .await?;
        self.client.parse_update_file_properties(response)
    }

    pub async fn upload_file(
        &self,
        site_url: Option<&str>,
        folder_url: &str,
        file_name: &str,
        contents: Vec<u8>,
        overwrite: bool,
    ) -> Result<Value, ApiError> {
        let request = self
            .client
            .build_upload_file(site_url, folder_url, file_name, contents, overwrite)?;
        let response = self.send(request).await?;
        self.client.parse_upload_file(response)
    }

    pub async fn copy_file(&self, copy: &FileCopy) -> Result<(), ApiError> {
        let response = self.send(self.client.build_copy_file(copy)?).await?;
        self.client.parse_copy_file(response)
    }

    pub async fn recycle_file(&self, site_url: Option<&str>, file_url: &str) -> Result<Uuid, ApiError> {
        let response = self
            .send(self.client.build_recycle_file(site_url, file_url)?)
            .await?;
        self.client.parse_recycle_file(response)
    }

    /// Ask first; `Ok(None)` when the user declines and nothing is sent.
    pub async fn recycle_file_confirmed(
        &self,
        site_url: Option<&str>,
        file_url: &str,
        confirm: &dyn Confirm,
    ) -> Result<Option<Uuid>, ApiError> {
        if !confirm.confirm("Are you sure you want to delete this item?") {
            debug!(file = file_url, "recycle declined");
            return Ok(None);
        }
        self.recycle_file(site_url, file_url).await.map(Some)
    }

    pub async fn current_user(&self, site_url: Option<&str>) -> Result<SiteUser, ApiError> {
        let response = self.send(self.client.build_current_user(site_url)?).await?;
        self.client.parse_current_user(response)
    }

    pub async fn user_groups(&self, site_url: Option<&str>, user_id: u64) -> Result<Vec<SiteGroup>, ApiError> {
        let response = self
            .send(self.client.build_user_groups(site_url, user_id)?)
            .await?;
        self.client.parse_user_groups(response)
    }

    pub async fn json_call(
        &self,
        verb: Verb,
        site_url: Option<&str>,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let response = self
            .send(self.client.build_json_call(verb, site_url, path, payload)?)
            .await?;
        self.client.parse_json_call(response)
    }
}
