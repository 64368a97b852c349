//! Stateless request builder and response parser for the SharePoint REST API.
//!
//! # Design
//! `SharePointClient` holds only a `SiteContext` and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The caller (or `RequestExecutor`) executes the actual
//! round-trip, keeping the core deterministic and free of I/O.
//!
//! Mutating builders read the request digest from the context at the moment
//! they run and fail with `MissingRequestDigest` when none is available.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::SiteContext;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::odata::{encode_segment, encode_slug_part, list_item_type_name, literal, QueryOptions};
use crate::request::{RequestDescriptor, Verb, SLUG};
use crate::types::{
    CamlQuery, CamlQueryPayload, Collection, FileCopy, FolderCreation, FolderFilesQuery,
    FolderPayload, ItemFields, ListItemUpdate, ListItemsQuery, RecycleResult, RootFolder,
    SiteGroup, SiteUser, TypeTag, Verbose, ViewQueryResult, ViewRef,
};

/// Synchronous, stateless client for the SharePoint REST API.
#[derive(Debug, Clone)]
pub struct SharePointClient {
    context: SiteContext,
}

impl SharePointClient {
    pub fn new(context: SiteContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &SiteContext {
        &self.context
    }

    fn site(&self, site_url: Option<&str>) -> String {
        self.context.resolve_site_url(site_url)
    }

    fn read(&self, site_url: Option<&str>, path: String) -> RequestDescriptor {
        RequestDescriptor::new(Verb::Get, &self.site(site_url), path)
    }

    fn write(&self, verb: Verb, site_url: Option<&str>, path: String) -> Result<RequestDescriptor, ApiError> {
        let digest = self.context.request_digest()?;
        Ok(RequestDescriptor::new(verb, &self.site(site_url), path).request_digest(digest))
    }

    // -----------------------------------------------------------------------
    // Lists and list items
    // -----------------------------------------------------------------------

    pub fn build_list_items(&self, query: &ListItemsQuery) -> Result<HttpRequest, ApiError> {
        let path = format!("/_api/web/lists/getbytitle({})/items", literal(&query.list_name));
        self.read(query.site_url.as_deref(), path)
            .query(query.options())
            .build()
    }

    pub fn parse_list_items(&self, response: HttpResponse) -> Result<Vec<Value>, ApiError> {
        parse_collection(response)
    }

    pub fn build_view_query(&self, view: &ViewRef) -> Result<HttpRequest, ApiError> {
        let path = format!(
            "/_api/web/lists/getbytitle({})/Views/getbytitle({})/ViewQuery",
            literal(&view.list_name),
            literal(&view.view_title)
        );
        self.read(view.site_url.as_deref(), path).build()
    }

    /// The view's CAML `<Where>`/`<OrderBy>` fragment.
    pub fn parse_view_query(&self, response: HttpResponse) -> Result<String, ApiError> {
        let result: ViewQueryResult = parse_entity(response)?;
        Ok(result.view_query)
    }

    /// `getitems` with a CAML query wrapped as `<View><Query>..</Query></View>`.
    pub fn build_items_by_caml(
        &self,
        site_url: Option<&str>,
        list_name: &str,
        caml: &str,
    ) -> Result<HttpRequest, ApiError> {
        let site = self.site(site_url);
        let path = format!("/_api/web/lists/getbytitle({})/getitems", literal(list_name));
        let payload = CamlQueryPayload {
            query: CamlQuery {
                metadata: TypeTag {
                    entity_type: "SP.CamlQuery".to_string(),
                },
                view_xml: format!("<View><Query>{caml}</Query></View>"),
            },
        };
        self.write(Verb::Post, Some(site.as_str()), path)?
            .query(
                QueryOptions::new()
                    .select("*,FieldValuesAsText/Title")
                    .expand("FieldValuesAsText")
                    .param("@target", literal(&site)),
            )
            .json_body(&payload)?
            .build()
    }

    pub fn parse_items_by_caml(&self, response: HttpResponse) -> Result<Vec<Value>, ApiError> {
        parse_collection(response)
    }

    pub fn build_update_list_item(&self, update: &ListItemUpdate) -> Result<HttpRequest, ApiError> {
        let path = format!(
            "/_api/web/lists/getbytitle({})/items({})",
            literal(&update.list_name),
            update.item_id
        );
        let body = with_metadata_type(&update.properties, list_item_type_name(&update.list_name));
        let mut descriptor = self
            .write(Verb::Merge, update.site_url.as_deref(), path)?
            .json_body(&body)?;
        if let Some(etag) = update.etag.as_deref().filter(|e| !e.is_empty()) {
            descriptor = descriptor.if_match(etag);
        }
        descriptor.build()
    }

    pub fn parse_update_list_item(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    // -----------------------------------------------------------------------
    // Libraries, folders and files
    // -----------------------------------------------------------------------

    pub fn build_folder_files(&self, query: &FolderFilesQuery) -> Result<HttpRequest, ApiError> {
        let path = format!(
            "/_api/web/GetFolderByServerRelativeUrl({})/Files",
            literal(&query.folder_url)
        );
        self.read(query.site_url.as_deref(), path)
            .query(query.options())
            .build()
    }

    pub fn parse_folder_files(&self, response: HttpResponse) -> Result<Vec<Value>, ApiError> {
        parse_collection(response)
    }

    pub fn build_list_root_folder(&self, site_url: Option<&str>, list_name: &str) -> Result<HttpRequest, ApiError> {
        let path = format!("/_api/lists/getbytitle({})/rootFolder", literal(list_name));
        self.read(site_url, path)
            .query(QueryOptions::new().select("ServerRelativeUrl"))
            .build()
    }

    /// Server-relative URL of the list's root folder.
    pub fn parse_list_root_folder(&self, response: HttpResponse) -> Result<String, ApiError> {
        let folder: RootFolder = parse_entity(response)?;
        Ok(folder.server_relative_url)
    }

    /// Create a folder of the given content type under `list_url`, the value
    /// returned by `parse_list_root_folder`.
    pub fn build_create_folder(&self, folder: &FolderCreation, list_url: &str) -> Result<HttpRequest, ApiError> {
        let path = format!("/_vti_bin/listdata.svc/{}", encode_segment(&folder.list_name)?);
        let payload = FolderPayload {
            title: &folder.folder_name,
            path: list_url,
        };
        let slug = format!(
            "{}|{}",
            encode_slug_part(&format!("{list_url}/{}", folder.folder_name)),
            encode_slug_part(&folder.content_type_id)
        );
        self.write(Verb::Post, folder.site_url.as_deref(), path)?
            .path_encoded()
            .json_body(&payload)?
            .header(SLUG, slug)
            .build()
    }

    pub fn parse_create_folder(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_entity(response)
    }

    pub fn build_file_item_fields(&self, site_url: Option<&str>, file_url: &str) -> Result<HttpRequest, ApiError> {
        self.read(site_url, file_item_path(file_url)).build()
    }

    pub fn parse_file_item_fields(&self, response: HttpResponse) -> Result<ItemFields, ApiError> {
        parse_entity(response)
    }

    /// MERGE `properties` into the file's list item, guarded by the etag in
    /// `current` (the result of `parse_file_item_fields`).
    pub fn build_update_file_properties(
        &self,
        site_url: Option<&str>,
        file_url: &str,
        current: &ItemFields,
        properties: &Map<String, Value>,
    ) -> Result<HttpRequest, ApiError> {
        let body = with_metadata_type(properties, current.metadata.entity_type.clone());
        let mut descriptor = self
            .write(Verb::Merge, site_url, file_item_path(file_url))?
            .json_body(&body)?;
        if let Some(etag) = current.metadata.etag.as_deref() {
            descriptor = descriptor.if_match(etag);
        }
        descriptor.build()
    }

    pub fn parse_update_file_properties(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    /// Single-shot upload of a whole file into `folder_url`.
    pub fn build_upload_file(
        &self,
        site_url: Option<&str>,
        folder_url: &str,
        file_name: &str,
        contents: Vec<u8>,
        overwrite: bool,
    ) -> Result<HttpRequest, ApiError> {
        if file_name.is_empty() {
            return Err(ApiError::InvalidInput("file name is empty".to_string()));
        }
        let path = format!(
            "/_api/web/GetFolderByServerRelativeUrl({})/Files/add(overwrite={overwrite},url={})",
            literal(folder_url),
            literal(file_name)
        );
        self.write(Verb::Post, site_url, path)?
            .binary_body(contents)
            .build()
    }

    /// Metadata of the uploaded file.
    pub fn parse_upload_file(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_entity(response)
    }

    pub fn build_copy_file(&self, copy: &FileCopy) -> Result<HttpRequest, ApiError> {
        let path = format!(
            "/_api/web/GetFileByServerRelativeUrl({})/copyTo(strNewUrl={})",
            literal(&copy.source_url),
            literal(&copy.destination_url)
        );
        self.write(Verb::Post, copy.site_url.as_deref(), path)?.build()
    }

    pub fn parse_copy_file(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    /// Move a file to the recycle bin.
    pub fn build_recycle_file(&self, site_url: Option<&str>, file_url: &str) -> Result<HttpRequest, ApiError> {
        let path = format!("/_api/web/GetFileByServerRelativeUrl({})/recycle()", literal(file_url));
        self.write(Verb::Delete, site_url, path)?.build()
    }

    /// Recycle-bin item id.
    pub fn parse_recycle_file(&self, response: HttpResponse) -> Result<Uuid, ApiError> {
        let result: RecycleResult = parse_entity(response)?;
        Ok(result.recycle)
    }

    // -----------------------------------------------------------------------
    // Users and groups
    // -----------------------------------------------------------------------

    pub fn build_current_user(&self, site_url: Option<&str>) -> Result<HttpRequest, ApiError> {
        self.read(site_url, "/_api/web/CurrentUser".to_string()).build()
    }

    pub fn parse_current_user(&self, response: HttpResponse) -> Result<SiteUser, ApiError> {
        parse_entity(response)
    }

    pub fn build_user_groups(&self, site_url: Option<&str>, user_id: u64) -> Result<HttpRequest, ApiError> {
        self.read(site_url, format!("/_api/web/GetUserById({user_id})/Groups"))
            .build()
    }

    pub fn parse_user_groups(&self, response: HttpResponse) -> Result<Vec<SiteGroup>, ApiError> {
        parse_collection(response)
    }

    // -----------------------------------------------------------------------
    // Generic calls
    // -----------------------------------------------------------------------

    /// Arbitrary call under `/_api`. `path` is raw, e.g.
    /// `"/_api/web/lists/getbytitle('Tasks')/items?$filter=Id eq 2"`.
    /// Anything after `?` is split into `name=value` pairs whose values are
    /// taken as unencoded text. Mutating verbs get the request digest.
    pub fn build_json_call(
        &self,
        verb: Verb,
        site_url: Option<&str>,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<HttpRequest, ApiError> {
        let (resource, query) = path.split_once('?').unwrap_or((path, ""));
        let options = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .fold(QueryOptions::new(), |options, pair| {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                options.param(name, value)
            });
        let descriptor = if verb.is_mutating() {
            self.write(verb, site_url, resource.to_string())?
        } else {
            self.read(site_url, resource.to_string())
        };
        let mut descriptor = descriptor.query(options);
        if let Some(payload) = payload {
            descriptor = descriptor.json_body(payload)?;
        }
        descriptor.build()
    }

    /// The `d` payload, or `Value::Null` for empty successful responses.
    pub fn parse_json_call(&self, response: HttpResponse) -> Result<Value, ApiError> {
        check_status(&response)?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
        Ok(match value {
            Value::Object(mut map) if map.contains_key("d") => map.remove("d").unwrap_or(Value::Null),
            other => other,
        })
    }
}

fn file_item_path(file_url: &str) -> String {
    format!(
        "/_api/web/GetFileByServerRelativeUrl({})/ListItemAllFields",
        literal(file_url)
    )
}

fn with_metadata_type(properties: &Map<String, Value>, entity_type: String) -> Map<String, Value> {
    let mut body = properties.clone();
    body.insert(
        "__metadata".to_string(),
        serde_json::json!({ "type": entity_type }),
    );
    body
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

fn parse_entity<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    let envelope: Verbose<T> = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
    Ok(envelope.d)
}

fn parse_collection<T: DeserializeOwned>(response: HttpResponse) -> Result<Vec<T>, ApiError> {
    let collection: Collection<T> = parse_entity(response)?;
    Ok(collection.results)
}
