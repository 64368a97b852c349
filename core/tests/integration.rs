//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port. The synchronous test drives the
//! build/parse pairs over ureq, the way a host application would; the async
//! tests go through `RequestExecutor` and `ReqwestTransport` to cover the
//! two-step compositions and bulk uploads.

use std::net::SocketAddr;
use std::sync::Mutex;

use serde_json::{json, Map, Value};
use sprest_core::{
    group_titles, ApiError, BatchOutcome, BatchReport, Body, FileCopy, FixedDigest, FolderCreation,
    FolderFilesQuery, HttpMethod, HttpRequest, HttpResponse, ListItemUpdate, ListItemsQuery,
    LocalFile, Notifier, ReqwestTransport, RequestExecutor, SharePointClient, SiteContext, Verb,
    ViewRef,
};

const DOCS: &str = "/sites/a/Shared Documents";

fn spawn_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn site_url(addr: SocketAddr) -> String {
    format!("http://{addr}{}", mock_server::SITE_PATH)
}

fn context(addr: SocketAddr) -> SiteContext {
    SiteContext::new(&site_url(addr), FixedDigest::new(mock_server::REQUEST_DIGEST))
}

/// Execute an `HttpRequest` using ureq, returning non-2xx statuses as data.
fn execute(req: HttpRequest) -> HttpResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut response = match req.method {
        HttpMethod::Get => {
            let mut builder = agent.get(&req.url);
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder.call()
        }
        HttpMethod::Post => {
            let mut builder = agent.post(&req.url);
            for (name, value) in &req.headers {
                if name.eq_ignore_ascii_case("Content-Length") {
                    continue;
                }
                builder = builder.header(name.as_str(), value.as_str());
            }
            match req.body {
                Some(body) => builder.send(&body.into_bytes()[..]),
                None => builder.send_empty(),
            }
        }
    }
    .expect("HTTP transport error");

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();

    HttpResponse {
        status,
        headers: Vec::new(),
        body,
    }
}

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn host_driven_lifecycle() {
    let addr = spawn_server();
    let client = SharePointClient::new(context(addr));

    // Step 1: filtered and ordered list items.
    let query = ListItemsQuery::new("Tasks")
        .filter("Status eq 'Open'")
        .order_by("Priority desc");
    let items = client
        .parse_list_items(execute(client.build_list_items(&query).unwrap()))
        .unwrap();
    let titles: Vec<&str> = items.iter().map(|i| i["Title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Ship", "Draft plan"]);

    // Step 2: MERGE an item, then read it back.
    let update = ListItemUpdate {
        list_name: "Tasks".into(),
        item_id: 2,
        properties: props(json!({"Status": "Open"})),
        site_url: None,
        etag: None,
    };
    let req = client.build_update_list_item(&update).unwrap();
    assert!(req.body.as_ref().and_then(Body::as_json).is_some());
    client.parse_update_list_item(execute(req)).unwrap();

    let items = client
        .parse_list_items(execute(
            client
                .build_list_items(&ListItemsQuery::new("Tasks").filter("Id eq 2"))
                .unwrap(),
        ))
        .unwrap();
    assert_eq!(items[0]["Status"], "Open");

    // Step 3: a stale etag is rejected as an HTTP error.
    let stale = ListItemUpdate {
        etag: Some("\"1\"".into()),
        ..update
    };
    let err = client
        .parse_update_list_item(execute(client.build_update_list_item(&stale).unwrap()))
        .unwrap_err();
    assert!(matches!(err, ApiError::HttpError { status: 412, .. }));

    // Step 4: root folder, then a folder under it.
    let root = client
        .parse_list_root_folder(execute(client.build_list_root_folder(None, "Documents").unwrap()))
        .unwrap();
    assert_eq!(root, DOCS);
    let folder = FolderCreation {
        site_url: None,
        list_name: "Documents".into(),
        folder_name: "Contracts".into(),
        content_type_id: "0x0120".into(),
    };
    let created = client
        .parse_create_folder(execute(client.build_create_folder(&folder, &root).unwrap()))
        .unwrap();
    assert_eq!(created["ServerRelativeUrl"], "/sites/a/Shared Documents/Contracts");

    // Step 5: upload into the new folder and list it.
    let contracts = format!("{DOCS}/Contracts");
    let uploaded = client
        .parse_upload_file(execute(
            client
                .build_upload_file(None, &contracts, "nda 2026.pdf", b"%PDF".to_vec(), true)
                .unwrap(),
        ))
        .unwrap();
    assert_eq!(uploaded["Name"], "nda 2026.pdf");
    let files = client
        .parse_folder_files(execute(
            client
                .build_folder_files(&FolderFilesQuery::new(contracts.clone()))
                .unwrap(),
        ))
        .unwrap();
    assert_eq!(files.len(), 1);

    // Step 6: read file fields, then MERGE guarded by the returned etag.
    let report = format!("{DOCS}/report.docx");
    let fields = client
        .parse_file_item_fields(execute(client.build_file_item_fields(None, &report).unwrap()))
        .unwrap();
    assert_eq!(fields.fields["Title"], "Report");
    let req = client
        .build_update_file_properties(None, &report, &fields, &props(json!({"Title": "Q3 Report"})))
        .unwrap();
    client.parse_update_file_properties(execute(req)).unwrap();

    // Step 7: copy, then recycle the copy.
    let copy = FileCopy {
        site_url: None,
        source_url: report.clone(),
        destination_url: format!("{contracts}/report copy.docx"),
    };
    client
        .parse_copy_file(execute(client.build_copy_file(&copy).unwrap()))
        .unwrap();
    let recycled = client
        .parse_recycle_file(execute(
            client.build_recycle_file(None, &copy.destination_url).unwrap(),
        ))
        .unwrap();
    assert!(!recycled.is_nil());

    // Step 8: the recycled file is gone.
    let err = client
        .parse_file_item_fields(execute(
            client
                .build_file_item_fields(None, &copy.destination_url)
                .unwrap(),
        ))
        .unwrap_err();
    assert!(err.is_not_found());

    // Step 9: users and groups.
    let user = client
        .parse_current_user(execute(client.build_current_user(None).unwrap()))
        .unwrap();
    assert_eq!(user.id, mock_server::CURRENT_USER_ID);
    let groups = client
        .parse_user_groups(execute(client.build_user_groups(None, user.id).unwrap()))
        .unwrap();
    assert_eq!(group_titles(&groups), vec!["Team Site Members", "Approvers"]);

    // Step 10: generic call.
    let value = client
        .parse_json_call(execute(
            client
                .build_json_call(Verb::Get, None, "/_api/web/CurrentUser", None)
                .unwrap(),
        ))
        .unwrap();
    assert_eq!(value["Title"], "Ada Lovelace");
}

#[test]
fn unknown_list_is_not_found_with_server_message() {
    let addr = spawn_server();
    let client = SharePointClient::new(context(addr));

    let err = client
        .parse_list_items(execute(
            client.build_list_items(&ListItemsQuery::new("Missing")).unwrap(),
        ))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn wrong_digest_is_forbidden() {
    let addr = spawn_server();
    let client = SharePointClient::new(SiteContext::new(&site_url(addr), FixedDigest::new("0xSTALE")));

    let req = client
        .build_upload_file(None, DOCS, "a.txt", b"a".to_vec(), true)
        .unwrap();
    let err = client.parse_upload_file(execute(req)).unwrap_err();
    assert!(matches!(err, ApiError::HttpError { status: 403, .. }));
    assert!(err.server_message().unwrap().contains("security validation"));
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

fn executor(addr: SocketAddr) -> RequestExecutor<ReqwestTransport> {
    RequestExecutor::new(context(addr), ReqwestTransport::new())
}

#[derive(Default)]
struct RecordingNotifier {
    failed: Mutex<Vec<String>>,
    finished: Mutex<Vec<(BatchOutcome, usize, usize, usize)>>,
}

impl Notifier for RecordingNotifier {
    fn upload_failed(&self, file_name: &str, _error: &ApiError) {
        self.failed.lock().unwrap().push(file_name.to_string());
    }

    fn batch_finished(&self, report: &BatchReport) {
        let tally = report.tally();
        self.finished.lock().unwrap().push((
            report.outcome(),
            tally.attempted(),
            tally.succeeded(),
            tally.failed(),
        ));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn items_for_view_runs_both_steps() {
    let addr = spawn_server();
    let exec = executor(addr);
    let view = ViewRef {
        site_url: None,
        list_name: "Tasks".into(),
        view_title: "Open Tasks".into(),
    };

    let items = exec.list_items_for_view(&view).await.unwrap();
    let mut titles: Vec<&str> = items.iter().map(|i| i["Title"].as_str().unwrap()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Draft plan", "Ship"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_view_stops_before_getitems() {
    let addr = spawn_server();
    let exec = executor(addr);
    let view = ViewRef {
        site_url: None,
        list_name: "Tasks".into(),
        view_title: "Nope".into(),
    };

    let err = exec.list_items_for_view(&view).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread")]
async fn document_set_lands_under_the_root_folder() {
    let addr = spawn_server();
    let exec = executor(addr);

    let created = exec.create_document_set(None, "Documents", "Project X").await.unwrap();
    assert_eq!(created["ContentTypeID"], "0x0120D520");

    let files = exec
        .folder_files(&FolderFilesQuery::new(format!("{DOCS}/Project X")))
        .await
        .unwrap();
    assert!(files.is_empty());

    // Creating it twice is a server-side conflict.
    let err = exec.create_document_set(None, "Documents", "Project X").await.unwrap_err();
    assert!(matches!(err, ApiError::HttpError { status: 409, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn document_set_names_survive_the_slug() {
    let addr = spawn_server();
    let exec = executor(addr);

    for name in ["Café Verträge", "Q1|Q2 Budget"] {
        let created = exec.create_document_set(None, "Documents", name).await.unwrap();
        assert_eq!(created["Title"], name);
        assert_eq!(created["ServerRelativeUrl"], format!("{DOCS}/{name}"));

        let files = exec
            .folder_files(&FolderFilesQuery::new(format!("{DOCS}/{name}")))
            .await
            .unwrap();
        assert!(files.is_empty(), "{name}: new folder is empty");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn json_call_carries_query_options() {
    let addr = spawn_server();
    let exec = executor(addr);

    let value = exec
        .json_call(
            Verb::Get,
            None,
            "/_api/web/lists/getbytitle('Tasks')/items?$filter=Status eq 'Open'&$orderby=Priority",
            None,
        )
        .await
        .unwrap();
    let titles: Vec<&str> = value["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["Title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Draft plan", "Ship"]);

    let value = exec
        .json_call(Verb::Get, None, "/_api/web/lists/getbytitle('Tasks')/items?$filter=Id eq 2", None)
        .await
        .unwrap();
    assert_eq!(value["results"][0]["Title"], "Review");
}

#[tokio::test(flavor = "multi_thread")]
async fn update_file_properties_twice_uses_fresh_etags() {
    let addr = spawn_server();
    let exec = executor(addr);
    let report = format!("{DOCS}/report.docx");

    exec.update_file_properties(None, &report, &props(json!({"Title": "Draft"})))
        .await
        .unwrap();
    exec.update_file_properties(None, &report, &props(json!({"Department": "Sales"})))
        .await
        .unwrap();

    let fields = exec.file_item_fields(None, &report).await.unwrap();
    assert_eq!(fields.fields["Title"], "Draft");
    assert_eq!(fields.fields["Department"], "Sales");
    assert_eq!(fields.metadata.etag.as_deref(), Some("\"3\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_batch_with_one_bad_file() {
    let addr = spawn_server();
    let exec = executor(addr);
    let dir = tempfile::tempdir().unwrap();
    let names = ["minutes.txt", "draft:v2.txt", "budget.csv"];
    let mut files = Vec::new();
    for name in names {
        let path = dir.path().join(name);
        tokio::fs::write(&path, name.as_bytes()).await.unwrap();
        files.push(LocalFile::from_path(&path).unwrap());
    }
    let notifier = RecordingNotifier::default();

    let report = exec.upload_files(None, DOCS, files, &notifier).await;

    assert_eq!(report.outcome(), BatchOutcome::CompletedWithFailures);
    let tally = report.tally();
    assert_eq!((tally.attempted(), tally.succeeded(), tally.failed()), (3, 2, 1));
    assert_eq!(report.failures()[0].file_name, "draft:v2.txt");
    assert_eq!(*notifier.failed.lock().unwrap(), vec!["draft:v2.txt".to_string()]);
    assert_eq!(
        *notifier.finished.lock().unwrap(),
        vec![(BatchOutcome::CompletedWithFailures, 3, 2, 1)]
    );

    let listed = exec.folder_files(&FolderFilesQuery::new(DOCS)).await.unwrap();
    let mut listed: Vec<&str> = listed.iter().map(|f| f["Name"].as_str().unwrap()).collect();
    listed.sort();
    assert_eq!(listed, vec!["budget.csv", "minutes.txt", "report.docx"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_batch_all_succeeded() {
    let addr = spawn_server();
    let exec = executor(addr);
    let files = vec![
        LocalFile::from_bytes("a.txt", b"a".to_vec()),
        LocalFile::from_bytes("b.txt", b"b".to_vec()),
    ];
    let notifier = RecordingNotifier::default();

    let report = exec.upload_files(None, DOCS, files, &notifier).await;

    assert_eq!(report.outcome(), BatchOutcome::AllSucceeded);
    assert_eq!(report.uploaded().len(), 2);
    assert!(notifier.failed.lock().unwrap().is_empty());
    assert_eq!(
        *notifier.finished.lock().unwrap(),
        vec![(BatchOutcome::AllSucceeded, 2, 2, 0)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn declined_recycle_keeps_the_file() {
    let addr = spawn_server();
    let exec = executor(addr);
    let report = format!("{DOCS}/report.docx");

    let declined = exec
        .recycle_file_confirmed(None, &report, &|_: &str| false)
        .await
        .unwrap();
    assert!(declined.is_none());
    assert!(exec.file_item_fields(None, &report).await.is_ok());

    let accepted = exec
        .recycle_file_confirmed(None, &report, &|_: &str| true)
        .await
        .unwrap();
    assert!(accepted.is_some());
    assert!(exec.file_item_fields(None, &report).await.unwrap_err().is_not_found());
}

#[tokio::test(flavor = "multi_thread")]
async fn read_only_context_refuses_mutations() {
    let addr = spawn_server();
    let exec = RequestExecutor::new(SiteContext::read_only(&site_url(addr)), ReqwestTransport::new());

    assert!(exec.current_user(None).await.is_ok());
    let err = exec
        .copy_file(&FileCopy {
            site_url: None,
            source_url: format!("{DOCS}/report.docx"),
            destination_url: format!("{DOCS}/copy.docx"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::MissingRequestDigest));
}
