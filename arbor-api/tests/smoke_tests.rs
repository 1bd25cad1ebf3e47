//! HTTP smoke tests driving the full router with `oneshot`.

use arbor_api::{build_state, create_api_router, AppState, ErrorCode};
use arbor_core::{ArborConfig, BigDocument, Document};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn app_with(nesting_level: u32) -> Result<(AppState, Router), Box<dyn std::error::Error>> {
    let state = build_state(ArborConfig::default().with_nesting_level(nesting_level))?;
    let app = create_api_router(state.clone());
    Ok((state, app))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn create(app: &Router, body: Value) -> Result<Document, Box<dyn std::error::Error>> {
    let (status, value) = send(app, "POST", "/docs", Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", value);
    Ok(serde_json::from_value(value)?)
}

#[tokio::test]
async fn test_create_and_get_document() -> TestResult {
    let (_, app) = app_with(5)?;
    let doc = create(&app, json!({ "Body": "hello", "Sort": 3 })).await?;
    assert_eq!(doc.body, "hello");
    assert_eq!(doc.sort, 3);
    assert_eq!(doc.depth, 0);

    let (status, value) = send(&app, "GET", &format!("/docs/{}", doc.id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["Body"], "hello");
    assert_eq!(value["ParentId"], 0);

    let (status, value) = send(&app, "GET", "/docs", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_update_builds_tree_and_big_doc_expands_it() -> TestResult {
    let (_, app) = app_with(5)?;
    let leaf = create(&app, json!({ "Body": "leaf" })).await?;
    let mid = create(&app, json!({ "Body": "mid", "ChildList": [leaf.id] })).await?;
    let root = create(&app, json!({ "Body": "root" })).await?;

    let (status, value) = send(
        &app,
        "PUT",
        &format!("/docs/{}", root.id),
        Some(json!({ "ChildList": [mid.id], "Depth": 99, "Unknown": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["Depth"], 2);

    let (status, value) = send(&app, "GET", &format!("/big-docs/{}", root.id), None).await?;
    assert_eq!(status, StatusCode::OK);
    let big: BigDocument = serde_json::from_value(value)?;
    assert_eq!(big.node_count(), 3);
    assert_eq!(big.child_list[0].child_list[0].id, leaf.id);

    let (status, value) = send(&app, "GET", "/big-docs", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_error_statuses() -> TestResult {
    let (_, app) = app_with(1)?;
    let child = create(&app, json!({ "Body": "child" })).await?;
    let parent = create(&app, json!({ "Body": "parent", "ChildList": [child.id] })).await?;
    let other = create(&app, json!({ "Body": "other" })).await?;

    let (status, value) = send(&app, "GET", "/docs/999", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["code"], "DOCUMENT_NOT_FOUND");

    let (status, value) = send(
        &app,
        "PUT",
        &format!("/docs/{}", other.id),
        Some(json!({ "ChildList": [child.id] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(value["code"], "ALREADY_HAS_PARENT");

    let (status, value) = send(
        &app,
        "PUT",
        &format!("/docs/{}", other.id),
        Some(json!({ "ChildList": [parent.id] })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(value["code"], "NESTING_LEVEL_EXCEEDED");

    let (status, value) = send(
        &app,
        "PUT",
        &format!("/docs/{}", other.id),
        Some(json!({ "Sort": "high" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: arbor_api::ApiError = serde_json::from_value(value)?;
    assert_eq!(error.code, ErrorCode::InvalidInput);

    let (status, value) = send(&app, "PUT", "/docs/0", Some(json!({ "Sort": 1 }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["code"], "INVALID_INPUT");
    Ok(())
}

#[tokio::test]
async fn test_failed_commit_maps_to_service_unavailable() -> TestResult {
    let (state, app) = app_with(5)?;
    let doc = create(&app, json!({ "Body": "kept" })).await?;

    state.store().fail_next_commit();
    let (status, value) = send(&app, "DELETE", &format!("/docs/{}", doc.id), None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(value["code"], "TRANSACTION_FAILED");

    let (status, _) = send(&app, "GET", &format!("/docs/{}", doc.id), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_delete_removes_subtree() -> TestResult {
    let (_, app) = app_with(5)?;
    let leaf = create(&app, json!({ "Body": "leaf" })).await?;
    let root = create(&app, json!({ "Body": "root", "ChildList": [leaf.id] })).await?;

    let (status, _) = send(&app, "DELETE", &format!("/docs/{}", root.id), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/docs/{}", leaf.id), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &format!("/docs/{}", root.id), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_health_and_unknown_route() -> TestResult {
    let (_, app) = app_with(5)?;
    create(&app, json!({ "Body": "one" })).await?;

    let (status, value) = send(&app, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "healthy");
    assert_eq!(value["details"]["documents"], 1);

    let (status, value) = send(&app, "GET", "/nowhere", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["code"], "ROUTE_NOT_FOUND");
    Ok(())
}
