//! In-memory stand-in for the parts of the SharePoint REST API the client
//! core talks to. The site lives at `/sites/a`.
//!
//! Every `POST` must carry `X-RequestDigest: REQUEST_DIGEST`. `MERGE` and
//! `DELETE` arrive as `POST` with `X-HTTP-Method`, as on the real server.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const SITE_PATH: &str = "/sites/a";
pub const REQUEST_DIGEST: &str = "0xMOCKDIGEST,18 Oct 2026 00:00:00 -0000";
pub const DOCUMENTS_FOLDER: &str = "/sites/a/Shared Documents";
pub const CURRENT_USER_ID: u64 = 7;

const INVALID_FILE_CHARS: &[char] = &['"', '*', ':', '<', '>', '?', '/', '\\', '|'];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "LoginName")]
    pub login_name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "IsSiteAdmin")]
    pub is_site_admin: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "Title")]
    pub title: String,
}

#[derive(Clone, Debug)]
struct View {
    title: String,
    caml: String,
    field: String,
    equals: String,
}

#[derive(Clone, Debug)]
struct Item {
    id: u64,
    etag: u64,
    fields: Map<String, Value>,
}

#[derive(Clone, Debug)]
struct List {
    title: String,
    entity_set: String,
    root_folder: String,
    item_type: String,
    file_item_type: String,
    items: Vec<Item>,
    views: Vec<View>,
}

#[derive(Clone, Debug)]
struct File {
    contents: Vec<u8>,
    etag: u64,
    item_type: String,
    fields: Map<String, Value>,
}

#[derive(Debug)]
pub struct Store {
    lists: Vec<List>,
    folders: BTreeSet<String>,
    files: BTreeMap<String, File>,
    users: Vec<User>,
    groups: HashMap<u64, Vec<Group>>,
}

pub type Db = Arc<RwLock<Store>>;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Store {
    /// A site with a "Tasks" list (three items, an "Open Tasks" view) and a
    /// "Documents" library holding `report.docx`.
    pub fn seeded() -> Self {
        let tasks = List {
            title: "Tasks".to_string(),
            entity_set: "Tasks".to_string(),
            root_folder: format!("{SITE_PATH}/Lists/Tasks"),
            item_type: "SP.Data.TasksListItem".to_string(),
            file_item_type: "SP.Data.TasksListItem".to_string(),
            items: vec![
                Item {
                    id: 1,
                    etag: 1,
                    fields: fields(json!({"Title": "Draft plan", "Status": "Open", "Priority": 2})),
                },
                Item {
                    id: 2,
                    etag: 1,
                    fields: fields(json!({"Title": "Review", "Status": "Done", "Priority": 1})),
                },
                Item {
                    id: 3,
                    etag: 1,
                    fields: fields(json!({"Title": "Ship", "Status": "Open", "Priority": 3})),
                },
            ],
            views: vec![View {
                title: "Open Tasks".to_string(),
                caml: "<Where><Eq><FieldRef Name=\"Status\" /><Value Type=\"Text\">Open</Value></Eq></Where>"
                    .to_string(),
                field: "Status".to_string(),
                equals: "Open".to_string(),
            }],
        };
        let documents = List {
            title: "Documents".to_string(),
            entity_set: "Documents".to_string(),
            root_folder: DOCUMENTS_FOLDER.to_string(),
            item_type: "SP.Data.Shared_x0020_DocumentsItem".to_string(),
            file_item_type: "SP.Data.Shared_x0020_DocumentsItem".to_string(),
            items: Vec::new(),
            views: Vec::new(),
        };

        let mut files = BTreeMap::new();
        files.insert(
            format!("{DOCUMENTS_FOLDER}/report.docx"),
            File {
                contents: b"quarterly report".to_vec(),
                etag: 1,
                item_type: documents.file_item_type.clone(),
                fields: fields(json!({"Title": "Report", "Department": "Finance"})),
            },
        );

        let folders = [tasks.root_folder.clone(), documents.root_folder.clone()]
            .into_iter()
            .collect();

        let users = vec![User {
            id: CURRENT_USER_ID,
            title: "Ada Lovelace".to_string(),
            login_name: "i:0#.f|membership|ada@contoso.com".to_string(),
            email: "ada@contoso.com".to_string(),
            is_site_admin: false,
        }];
        let mut groups = HashMap::new();
        groups.insert(
            CURRENT_USER_ID,
            vec![
                Group {
                    id: 3,
                    title: "Team Site Members".to_string(),
                },
                Group {
                    id: 5,
                    title: "Approvers".to_string(),
                },
            ],
        );

        Self {
            lists: vec![tasks, documents],
            folders,
            files,
            users,
            groups,
        }
    }

    fn list(&self, title: &str) -> Option<&List> {
        self.lists.iter().find(|l| l.title.eq_ignore_ascii_case(title))
    }

    fn list_mut(&mut self, title: &str) -> Option<&mut List> {
        self.lists.iter_mut().find(|l| l.title.eq_ignore_ascii_case(title))
    }

    fn file_item_type_for(&self, folder: &str) -> String {
        self.lists
            .iter()
            .filter(|l| folder.starts_with(&l.root_folder))
            .max_by_key(|l| l.root_folder.len())
            .map(|l| l.file_item_type.clone())
            .unwrap_or_else(|| "SP.ListItem".to_string())
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route(&format!("{SITE_PATH}/_api/{{*rest}}"), any(api))
        .route(
            &format!("{SITE_PATH}/_vti_bin/listdata.svc/{{entity}}"),
            post(create_folder),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
    Merge,
    Delete,
    Other,
}

fn effective_verb(method: &Method, headers: &HeaderMap) -> Verb {
    match *method {
        Method::GET => Verb::Get,
        Method::POST => match headers.get("x-http-method").and_then(|v| v.to_str().ok()) {
            None => Verb::Post,
            Some(m) if m.eq_ignore_ascii_case("MERGE") => Verb::Merge,
            Some(m) if m.eq_ignore_ascii_case("DELETE") => Verb::Delete,
            Some(_) => Verb::Other,
        },
        _ => Verb::Other,
    }
}

fn verbose(status: StatusCode, d: Value) -> Response {
    (status, Json(json!({ "d": d }))).into_response()
}

fn collection(results: Vec<Value>) -> Response {
    verbose(StatusCode::OK, json!({ "results": results }))
}

fn odata_error(status: StatusCode, message: &str) -> Response {
    let body = json!({
        "error": {
            "code": format!("-{}, Microsoft.SharePoint.SPException", status.as_u16()),
            "message": { "lang": "en-US", "value": message }
        }
    });
    (status, Json(body)).into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn check_digest(headers: &HeaderMap) -> Result<(), Response> {
    match header(headers, "x-requestdigest") {
        Some(digest) if digest == REQUEST_DIGEST => Ok(()),
        _ => Err(odata_error(
            StatusCode::FORBIDDEN,
            "The security validation for this page is invalid and might be corrupted.",
        )),
    }
}

fn etag_value(etag: u64) -> String {
    format!("\"{etag}\"")
}

fn if_match_ok(headers: &HeaderMap, etag: u64) -> bool {
    match header(headers, "if-match") {
        Some("*") => true,
        Some(value) => value == etag_value(etag),
        None => false,
    }
}

fn json_object(body: &[u8]) -> Result<Map<String, Value>, Response> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(odata_error(StatusCode::BAD_REQUEST, "Invalid JSON. A JSON object was expected.")),
    }
}

/// Split `web/lists/getbytitle('A/B')/items(3)` into segments, keeping `/`
/// inside quoted literals.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    name: String,
    args: Option<String>,
}

fn parse_segments(path: &str) -> Option<Vec<Segment>> {
    let mut raw = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut depth = 0i32;
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                current.push_str("''");
                chars.next();
            }
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            '(' if !in_quote => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_quote => {
                depth -= 1;
                current.push(c);
            }
            '/' if !in_quote && depth == 0 => {
                if !current.is_empty() {
                    raw.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if in_quote || depth != 0 {
        return None;
    }
    if !current.is_empty() {
        raw.push(current);
    }

    raw.into_iter()
        .map(|seg| match seg.find('(') {
            Some(open) => {
                let close = seg.rfind(')')?;
                Some(Segment {
                    name: seg[..open].to_string(),
                    args: Some(seg[open + 1..close].to_string()),
                })
            }
            None => Some(Segment { name: seg, args: None }),
        })
        .collect()
}

fn unquote(literal: &str) -> Option<String> {
    let inner = literal.trim().strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// `overwrite=true,url='a.txt'` as key/value pairs.
fn named_args(args: &str) -> HashMap<String, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for c in args.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ',' if !in_quote => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            Some((key.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

fn literal_arg(segment: &Segment) -> Option<String> {
    segment.args.as_deref().and_then(unquote)
}

// ---------------------------------------------------------------------------
// Item queries
// ---------------------------------------------------------------------------

fn render_item(list: &List, item: &Item) -> Value {
    let mut out = item.fields.clone();
    out.insert("Id".to_string(), json!(item.id));
    out.insert(
        "__metadata".to_string(),
        json!({ "type": list.item_type, "etag": etag_value(item.etag) }),
    );
    Value::Object(out)
}

/// Supports `Field eq 'text'` and `Field eq 42`.
fn filter_matches(item: &Item, filter: &str) -> Result<bool, String> {
    let mut parts = filter.splitn(3, ' ');
    let (Some(field), Some(op), Some(literal)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("unsupported filter: {filter}"));
    };
    if !op.eq_ignore_ascii_case("eq") {
        return Err(format!("unsupported operator: {op}"));
    }
    let expected = match unquote(literal) {
        Some(text) => Value::String(text),
        None => serde_json::from_str(literal).map_err(|_| format!("bad literal: {literal}"))?,
    };
    let actual = if field == "Id" {
        json!(item.id)
    } else {
        item.fields.get(field).cloned().unwrap_or(Value::Null)
    };
    Ok(actual == expected)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_items(items: &mut [&Item], order_by: &str) {
    let mut parts = order_by.split_whitespace();
    let field = parts.next().unwrap_or("Id").to_string();
    let descending = parts.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"));
    let key = |item: &Item| {
        if field == "Id" {
            json!(item.id)
        } else {
            item.fields.get(&field).cloned().unwrap_or(Value::Null)
        }
    };
    items.sort_by(|a, b| {
        let ord = compare_values(&key(a), &key(b));
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn query_param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn list_items(list: &List, params: &HashMap<String, String>) -> Response {
    let mut selected: Vec<&Item> = Vec::new();
    for item in &list.items {
        match query_param(params, "$filter") {
            Some(filter) => match filter_matches(item, filter) {
                Ok(true) => selected.push(item),
                Ok(false) => {}
                Err(message) => return odata_error(StatusCode::BAD_REQUEST, &message),
            },
            None => selected.push(item),
        }
    }
    if let Some(order_by) = query_param(params, "$orderby") {
        sort_items(&mut selected, order_by);
    }
    collection(selected.into_iter().map(|item| render_item(list, item)).collect())
}

fn items_by_caml(list: &List, body: &[u8]) -> Response {
    let payload = match json_object(body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    let query = payload.get("query").cloned().unwrap_or(Value::Null);
    if query["__metadata"]["type"] != "SP.CamlQuery" {
        return odata_error(StatusCode::BAD_REQUEST, "query must be an SP.CamlQuery");
    }
    let view_xml = query["ViewXml"].as_str().unwrap_or_default();
    let view = list
        .views
        .iter()
        .find(|v| view_xml == format!("<View><Query>{}</Query></View>", v.caml));
    let results = list
        .items
        .iter()
        .filter(|item| match view {
            Some(v) => item.fields.get(&v.field).and_then(Value::as_str) == Some(v.equals.as_str()),
            None => true,
        })
        .map(|item| render_item(list, item))
        .collect();
    collection(results)
}

fn merge_item(list: &mut List, id: u64, headers: &HeaderMap, body: &[u8]) -> Response {
    let mut payload = match json_object(body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    let item_type = list.item_type.clone();
    let Some(item) = list.items.iter_mut().find(|i| i.id == id) else {
        return odata_error(StatusCode::NOT_FOUND, "Item does not exist.");
    };
    if !if_match_ok(headers, item.etag) {
        return odata_error(
            StatusCode::PRECONDITION_FAILED,
            "The request ETag value does not match the object's ETag value.",
        );
    }
    let declared = payload.remove("__metadata").unwrap_or(Value::Null);
    if declared["type"] != item_type.as_str() {
        return odata_error(
            StatusCode::BAD_REQUEST,
            &format!("A type named '{}' could not be resolved by the model.", declared["type"]),
        );
    }
    item.fields.extend(payload);
    item.etag += 1;
    StatusCode::NO_CONTENT.into_response()
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

fn parent_folder(url: &str) -> &str {
    url.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn render_file(url: &str, file: &File) -> Value {
    let name = url.rsplit('/').next().unwrap_or(url);
    json!({
        "__metadata": { "type": "SP.File" },
        "Name": name,
        "ServerRelativeUrl": url,
        "Length": file.contents.len().to_string(),
        "ETag": etag_value(file.etag),
    })
}

fn add_file(store: &mut Store, folder: &str, args: &str, body: Bytes) -> Response {
    let args = named_args(args);
    let Some(name) = args.get("url").and_then(|v| unquote(v)) else {
        return odata_error(StatusCode::BAD_REQUEST, "Parameter url is missing.");
    };
    let overwrite = args.get("overwrite").is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if !store.folders.contains(folder) {
        return odata_error(StatusCode::NOT_FOUND, "File Not Found.");
    }
    if name.is_empty() || name.contains(INVALID_FILE_CHARS) {
        return odata_error(
            StatusCode::BAD_REQUEST,
            &format!("The file name '{name}' contains invalid characters."),
        );
    }
    let url = format!("{folder}/{name}");
    let etag = match store.files.get(&url) {
        Some(_) if !overwrite => {
            return odata_error(
                StatusCode::BAD_REQUEST,
                &format!("A file with the name {url} already exists."),
            )
        }
        Some(existing) => existing.etag + 1,
        None => 1,
    };
    let item_type = store.file_item_type_for(folder);
    let file = File {
        contents: body.to_vec(),
        etag,
        item_type,
        fields: Map::new(),
    };
    let rendered = render_file(&url, &file);
    store.files.insert(url, file);
    verbose(StatusCode::OK, rendered)
}

fn file_fields(file: &File) -> Value {
    let mut out = file.fields.clone();
    out.insert(
        "__metadata".to_string(),
        json!({ "type": file.item_type, "etag": etag_value(file.etag) }),
    );
    Value::Object(out)
}

fn merge_file_fields(file: &mut File, headers: &HeaderMap, body: &[u8]) -> Response {
    let mut payload = match json_object(body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };
    if !if_match_ok(headers, file.etag) {
        return odata_error(
            StatusCode::PRECONDITION_FAILED,
            "The request ETag value does not match the object's ETag value.",
        );
    }
    let declared = payload.remove("__metadata").unwrap_or(Value::Null);
    if declared["type"] != file.item_type.as_str() {
        return odata_error(StatusCode::BAD_REQUEST, "Entity type mismatch.");
    }
    file.fields.extend(payload);
    file.etag += 1;
    StatusCode::NO_CONTENT.into_response()
}

fn copy_file(store: &mut Store, source: &str, args: &str) -> Response {
    let args = named_args(args);
    let Some(destination) = args.get("strnewurl").and_then(|v| unquote(v)) else {
        return odata_error(StatusCode::BAD_REQUEST, "Parameter strNewUrl is missing.");
    };
    let Some(file) = store.files.get(source).cloned() else {
        return odata_error(StatusCode::NOT_FOUND, "File Not Found.");
    };
    if !store.folders.contains(parent_folder(&destination)) {
        return odata_error(StatusCode::NOT_FOUND, "Destination folder does not exist.");
    }
    store.files.insert(destination, File { etag: 1, ..file });
    verbose(StatusCode::OK, json!({ "CopyTo": null }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn api(
    State(db): State<Db>,
    method: Method,
    Path(rest): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let verb = effective_verb(&method, &headers);
    debug!(?verb, path = %rest, "mock request");
    if method == Method::POST {
        if let Err(resp) = check_digest(&headers) {
            return resp;
        }
    }
    let Some(segments) = parse_segments(&rest) else {
        return odata_error(StatusCode::BAD_REQUEST, "Malformed resource path.");
    };
    let names: Vec<String> = segments.iter().map(|s| s.name.to_ascii_lowercase()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    match (verb, names.as_slice()) {
        (Verb::Get, ["web", "lists", "getbytitle", "items"]) if segments[3].args.is_none() => {
            let store = db.read().await;
            match literal_arg(&segments[2]).and_then(|t| store.list(&t)) {
                Some(list) => list_items(list, &params),
                None => list_not_found(),
            }
        }
        (Verb::Merge, ["web", "lists", "getbytitle", "items"]) => {
            let Some(id) = segments[3].args.as_deref().and_then(|a| a.parse::<u64>().ok()) else {
                return odata_error(StatusCode::BAD_REQUEST, "Item id is missing.");
            };
            let title = literal_arg(&segments[2]).unwrap_or_default();
            let mut store = db.write().await;
            match store.list_mut(&title) {
                Some(list) => merge_item(list, id, &headers, &body),
                None => list_not_found(),
            }
        }
        (Verb::Get, ["web", "lists", "getbytitle", "views", "getbytitle", "viewquery"]) => {
            let store = db.read().await;
            let Some(list) = literal_arg(&segments[2]).and_then(|t| store.list(&t)) else {
                return list_not_found();
            };
            let title = literal_arg(&segments[4]).unwrap_or_default();
            match list.views.iter().find(|v| v.title.eq_ignore_ascii_case(&title)) {
                Some(view) => verbose(StatusCode::OK, json!({ "ViewQuery": view.caml })),
                None => odata_error(StatusCode::NOT_FOUND, "The specified view is invalid."),
            }
        }
        (Verb::Post, ["web", "lists", "getbytitle", "getitems"]) => {
            let store = db.read().await;
            match literal_arg(&segments[2]).and_then(|t| store.list(&t)) {
                Some(list) => items_by_caml(list, &body),
                None => list_not_found(),
            }
        }
        (Verb::Get, ["lists", "getbytitle", "rootfolder"]) => {
            let store = db.read().await;
            match literal_arg(&segments[1]).and_then(|t| store.list(&t)) {
                Some(list) => verbose(StatusCode::OK, json!({ "ServerRelativeUrl": list.root_folder })),
                None => list_not_found(),
            }
        }
        (Verb::Get, ["web", "getfolderbyserverrelativeurl", "files"]) => {
            let store = db.read().await;
            let folder = literal_arg(&segments[1]).unwrap_or_default();
            if !store.folders.contains(&folder) {
                return odata_error(StatusCode::NOT_FOUND, "File Not Found.");
            }
            let files = store
                .files
                .iter()
                .filter(|(url, _)| parent_folder(url) == folder)
                .map(|(url, file)| render_file(url, file))
                .collect();
            collection(files)
        }
        (Verb::Post, ["web", "getfolderbyserverrelativeurl", "files", "add"]) => {
            let folder = literal_arg(&segments[1]).unwrap_or_default();
            let args = segments[3].args.clone().unwrap_or_default();
            let mut store = db.write().await;
            add_file(&mut store, &folder, &args, body)
        }
        (Verb::Get, ["web", "getfilebyserverrelativeurl", "listitemallfields"]) => {
            let store = db.read().await;
            let url = literal_arg(&segments[1]).unwrap_or_default();
            match store.files.get(&url) {
                Some(file) => verbose(StatusCode::OK, file_fields(file)),
                None => odata_error(StatusCode::NOT_FOUND, "File Not Found."),
            }
        }
        (Verb::Merge, ["web", "getfilebyserverrelativeurl", "listitemallfields"]) => {
            let mut store = db.write().await;
            let url = literal_arg(&segments[1]).unwrap_or_default();
            match store.files.get_mut(&url) {
                Some(file) => merge_file_fields(file, &headers, &body),
                None => odata_error(StatusCode::NOT_FOUND, "File Not Found."),
            }
        }
        (Verb::Post, ["web", "getfilebyserverrelativeurl", "copyto"]) => {
            let source = literal_arg(&segments[1]).unwrap_or_default();
            let args = segments[2].args.clone().unwrap_or_default();
            let mut store = db.write().await;
            copy_file(&mut store, &source, &args)
        }
        (Verb::Post | Verb::Delete, ["web", "getfilebyserverrelativeurl", "recycle"]) => {
            let mut store = db.write().await;
            let url = literal_arg(&segments[1]).unwrap_or_default();
            match store.files.remove(&url) {
                Some(_) => verbose(StatusCode::OK, json!({ "Recycle": Uuid::new_v4() })),
                None => odata_error(StatusCode::NOT_FOUND, "File Not Found."),
            }
        }
        (Verb::Get, ["web", "currentuser"]) => {
            let store = db.read().await;
            match store.users.iter().find(|u| u.id == CURRENT_USER_ID) {
                Some(user) => verbose(StatusCode::OK, json!(user)),
                None => odata_error(StatusCode::UNAUTHORIZED, "Access denied."),
            }
        }
        (Verb::Get, ["web", "getuserbyid", "groups"]) => {
            let store = db.read().await;
            let id = segments[1].args.as_deref().and_then(|a| a.parse::<u64>().ok());
            match id.filter(|id| store.users.iter().any(|u| u.id == *id)) {
                Some(id) => {
                    let groups = store.groups.get(&id).cloned().unwrap_or_default();
                    collection(groups.into_iter().map(|g| json!(g)).collect())
                }
                None => odata_error(StatusCode::NOT_FOUND, "User cannot be found."),
            }
        }
        _ => odata_error(StatusCode::NOT_FOUND, "Cannot find resource for the request."),
    }
}

fn list_not_found() -> Response {
    odata_error(StatusCode::NOT_FOUND, "List does not exist at site with URL.")
}

#[derive(Deserialize)]
struct FolderRequest {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Path")]
    path: String,
}

async fn create_folder(
    State(db): State<Db>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    Json(input): Json<FolderRequest>,
) -> Response {
    if let Err(resp) = check_digest(&headers) {
        return resp;
    }
    let mut store = db.write().await;
    let Some(root) = store
        .lists
        .iter()
        .find(|l| l.entity_set.eq_ignore_ascii_case(&entity))
        .map(|l| l.root_folder.clone())
    else {
        return odata_error(StatusCode::NOT_FOUND, "Resource not found for the segment.");
    };
    if input.path != root {
        return odata_error(StatusCode::BAD_REQUEST, "Path must be the list root folder.");
    }
    let slug = header(&headers, "slug").unwrap_or_default();
    let Some((target, content_type)) = slug.split_once('|').and_then(|(target, content_type)| {
        Some((decode_slug_part(target)?, decode_slug_part(content_type)?))
    }) else {
        return odata_error(StatusCode::BAD_REQUEST, "Slug must be '<url>|<content type id>'.");
    };
    let folder = format!("{root}/{}", input.title);
    if target != folder {
        return odata_error(StatusCode::BAD_REQUEST, "Slug does not match Title and Path.");
    }
    if !store.folders.insert(folder.clone()) {
        return odata_error(StatusCode::CONFLICT, "A folder with that name already exists.");
    }
    verbose(
        StatusCode::CREATED,
        json!({
            "Title": input.title,
            "Path": input.path,
            "ContentTypeID": content_type,
            "ServerRelativeUrl": folder,
        }),
    )
}

/// Slug halves arrive percent-encoded (RFC 5023 §9.7).
fn decode_slug_part(part: &str) -> Option<String> {
    percent_decode_str(part).decode_utf8().ok().map(|s| s.into_owned())
}
