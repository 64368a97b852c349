//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results or errors. Bodies are compared as parsed JSON
//! so field order does not matter.

use serde_json::Value;
use sprest_core::{
    ApiError, FileCopy, FixedDigest, HttpMethod, HttpRequest, HttpResponse, ListItemUpdate,
    ListItemsQuery, SharePointClient, SiteContext,
};

const SITE_URL: &str = "https://contoso.sharepoint.com/sites/a";
const DIGEST: &str = "0xDIGEST";

fn client() -> SharePointClient {
    SharePointClient::new(SiteContext::new(SITE_URL, FixedDigest::new(DIGEST)))
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn simulated_response(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

/// Assert method, URL, headers and (when present) the JSON body.
fn check_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(
        req.url,
        format!("{SITE_URL}{}", expected["path"].as_str().unwrap()),
        "{name}: url"
    );

    let expected_headers: Vec<(String, String)> = expected["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect();
    assert_eq!(req.headers, expected_headers, "{name}: headers");

    if let Some(body) = expected.get("body") {
        let json = req.body.as_ref().and_then(|b| b.as_json()).unwrap();
        let actual: Value = serde_json::from_str(json).unwrap();
        assert_eq!(&actual, body, "{name}: body");
    }
}

/// Match a parse error against the vector's `expected_error` tag.
fn check_error(name: &str, err: &ApiError, expected: &str) {
    match expected {
        "not_found" => assert!(err.is_not_found(), "{name}: expected NotFound, got {err:?}"),
        tag => {
            let status: u16 = tag.strip_prefix("http_").unwrap().parse().unwrap();
            assert!(
                matches!(err, ApiError::HttpError { status: s, .. } if *s == status),
                "{name}: expected HTTP {status}, got {err:?}"
            );
        }
    }
}

fn cases(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

// ---------------------------------------------------------------------------
// List items
// ---------------------------------------------------------------------------

#[test]
fn list_items_test_vectors() {
    let c = client();
    for case in cases(include_str!("../../test-vectors/list_items.json")) {
        let name = case["name"].as_str().unwrap();
        let input: ListItemsQuery = serde_json::from_value(case["input"].clone()).unwrap();

        let req = c.build_list_items(&input).unwrap();
        check_request(name, &req, &case["expected_request"]);
        assert!(req.body.is_none(), "{name}: GET has no body");

        let result = c.parse_list_items(simulated_response(&case));
        match case.get("expected_error").and_then(Value::as_str) {
            Some(expected) => check_error(name, &result.unwrap_err(), expected),
            None => {
                let items = result.unwrap();
                assert_eq!(Value::Array(items), case["expected_result"], "{name}: parsed result");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Update list item
// ---------------------------------------------------------------------------

#[test]
fn update_list_item_test_vectors() {
    let c = client();
    for case in cases(include_str!("../../test-vectors/update_list_item.json")) {
        let name = case["name"].as_str().unwrap();
        let input: ListItemUpdate = serde_json::from_value(case["input"].clone()).unwrap();

        let req = c.build_update_list_item(&input).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_update_list_item(simulated_response(&case));
        match case.get("expected_error").and_then(Value::as_str) {
            Some(expected) => check_error(name, &result.unwrap_err(), expected),
            None => result.unwrap(),
        }
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn files_test_vectors() {
    let c = client();
    for case in cases(include_str!("../../test-vectors/files.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let response = simulated_response(&case);
        let expected_error = case.get("expected_error").and_then(Value::as_str);

        let (req, result): (HttpRequest, Result<Value, ApiError>) =
            match case["operation"].as_str().unwrap() {
                "upload_file" => {
                    let contents = input["contents"].as_str().unwrap().as_bytes().to_vec();
                    let req = c
                        .build_upload_file(
                            None,
                            input["folder_url"].as_str().unwrap(),
                            input["file_name"].as_str().unwrap(),
                            contents.clone(),
                            input["overwrite"].as_bool().unwrap(),
                        )
                        .unwrap();
                    assert_eq!(req.body.clone().unwrap().into_bytes(), contents, "{name}: body");
                    (req, c.parse_upload_file(response))
                }
                "copy_file" => {
                    let copy: FileCopy = serde_json::from_value(input.clone()).unwrap();
                    let req = c.build_copy_file(&copy).unwrap();
                    (req, c.parse_copy_file(response).map(|()| Value::Null))
                }
                "recycle_file" => {
                    let req = c
                        .build_recycle_file(None, input["file_url"].as_str().unwrap())
                        .unwrap();
                    let result = c
                        .parse_recycle_file(response)
                        .map(|id| Value::String(id.to_string()));
                    (req, result)
                }
                other => panic!("unknown operation: {other}"),
            };

        check_request(name, &req, &case["expected_request"]);
        match expected_error {
            Some(expected) => check_error(name, &result.unwrap_err(), expected),
            None => assert_eq!(result.unwrap(), case["expected_result"], "{name}: parsed result"),
        }
    }
}
