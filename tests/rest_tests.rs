//! End-to-end tests over HTTP
//!
//! A client talks to the Axum router built by `ServerBuilder`, with the
//! fixture blog behind it.

mod fixtures;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::TestServer;
use fixtures::*;
use jsonapi::prelude::*;
use serde_json::{Value, json};

async fn create_test_server() -> TestServer {
    let router = ServerBuilder::new()
        .with_graph(graph())
        .with_options(JsonApiOptions {
            namespace: Some("api".to_string()),
            include_total_resource_count: true,
            ..JsonApiOptions::default()
        })
        .with_data_source(seeded_data_source().await)
        .build()
        .expect("router should build");

    TestServer::new(router).expect("Failed to create test server")
}

fn jsonapi_body(value: Value) -> Bytes {
    Bytes::from(serde_json::to_vec(&value).expect("should serialize"))
}

fn first_error(body: &Value) -> &Value {
    &body["errors"][0]
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "this-jsonapi");
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_get_collection_with_includes() {
    let server = create_test_server().await;

    let response = server
        .get("/api/articles")
        .add_query_param("include", "tags")
        .add_query_param("sort", "-wordCount")
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("content-type"), MEDIA_TYPE);

    let body: Value = response.json();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .expect("collection")
        .iter()
        .filter_map(|item| item["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    // tag 2 is shared by articles 1 and 2 but included once
    let included = body["included"].as_array().expect("included present");
    assert_eq!(included.len(), 2);
    assert_eq!(body["meta"]["total"], json!(3));
    assert_eq!(body["data"][0]["links"]["self"], json!("/api/articles/1"));
}

#[tokio::test]
async fn test_get_secondary_and_relationship_endpoints() {
    let server = create_test_server().await;

    let response = server.get("/api/articles/1/author").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["type"], "people");
    assert_eq!(body["data"]["attributes"]["name"], "Ada");

    let response = server.get("/api/articles/1/relationships/tags").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        body["data"],
        json!([{ "type": "tags", "id": "1" }, { "type": "tags", "id": "2" }])
    );

    let response = server.get("/api/articles/3/author").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], Value::Null);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_error_documents() {
    let server = create_test_server().await;

    let response = server.get("/api/articles/99").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.header("content-type"), MEDIA_TYPE);
    let body: Value = response.json();
    assert_eq!(first_error(&body)["status"], "404");
    assert!(body.get("data").is_none());

    let response = server
        .get("/api/articles")
        .add_query_param("filter", "equals(caption")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(first_error(&body)["status"], "400");
    assert_eq!(first_error(&body)["source"]["parameter"], "filter");

    let response = server.get("/api/unicorns").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/articles/1/unknown").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_content_type_is_rejected() {
    let server = create_test_server().await;

    let response = server
        .post("/api/tags")
        .json(&json!({ "data": { "type": "tags", "attributes": { "name": "go" } } }))
        .await;
    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json();
    assert_eq!(first_error(&body)["status"], "415");

    let response = server.get("/api/tags").await;
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_invalid_body_points_at_the_problem() {
    let server = create_test_server().await;

    let response = server
        .post("/api/articles")
        .bytes(jsonapi_body(json!({
            "data": { "type": "articles", "attributes": { "caption": "X", "colour": "red" } }
        })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(
        first_error(&body)["source"]["pointer"],
        "/data/attributes/colour"
    );

    let response = server
        .post("/api/articles")
        .bytes(Bytes::from_static(b"{ not json"))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_create_update_delete_flow() {
    let server = create_test_server().await;

    // Create
    let response = server
        .post("/api/tags")
        .bytes(jsonapi_body(json!({
            "data": { "type": "tags", "attributes": { "name": "go" } }
        })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let id = body["data"]["id"].as_str().expect("id assigned").to_string();
    assert_eq!(body["data"]["attributes"]["name"], "go");

    // Update
    let response = server
        .patch(&format!("/api/tags/{}", id))
        .bytes(jsonapi_body(json!({
            "data": { "type": "tags", "id": id, "attributes": { "name": "golang" } }
        })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["attributes"]["name"], "golang");

    // Mismatched id
    let response = server
        .patch(&format!("/api/tags/{}", id))
        .bytes(jsonapi_body(json!({
            "data": { "type": "tags", "id": "1", "attributes": { "name": "x" } }
        })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::CONFLICT);

    // Delete
    let response = server.delete(&format!("/api/tags/{}", id)).await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server.get(&format!("/api/tags/{}", id)).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_relationship_writes() {
    let server = create_test_server().await;

    let response = server
        .post("/api/articles/3/relationships/tags")
        .bytes(jsonapi_body(json!({ "data": [{ "type": "tags", "id": "3" }] })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server
        .patch("/api/articles/3/relationships/author")
        .bytes(jsonapi_body(json!({ "data": { "type": "people", "id": "2" } })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get("/api/articles/3")
        .add_query_param("include", "tags,author")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        body["data"]["relationships"]["tags"]["data"],
        json!([{ "type": "tags", "id": "3" }])
    );
    assert_eq!(
        body["data"]["relationships"]["author"]["data"],
        json!({ "type": "people", "id": "2" })
    );

    let response = server
        .delete("/api/articles/1/relationships/tags")
        .bytes(jsonapi_body(json!({ "data": [{ "type": "tags", "id": "1" }] })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server.get("/api/articles/1/relationships/tags").await;
    let body: Value = response.json();
    assert_eq!(body["data"], json!([{ "type": "tags", "id": "2" }]));

    // to-one relationships only support complete replacement
    let response = server
        .post("/api/articles/1/relationships/author")
        .bytes(jsonapi_body(json!({ "data": { "type": "people", "id": "2" } })))
        .content_type(MEDIA_TYPE)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}
