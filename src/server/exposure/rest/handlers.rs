//! HTTP handlers for the JSON:API endpoints
//!
//! Handlers are resource-type agnostic: the type, id and relationship come
//! from the path and everything else is delegated to the resource service.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::core::error::{JsonApiError, JsonApiResult, ValidationError};
use crate::serialization::objects::{Document, MEDIA_TYPE};
use crate::server::host::JsonApiHost;
use crate::services::JsonApiResponse;

type QueryPairs = Query<Vec<(String, String)>>;

/// GET /{resource_type}
pub async fn get_all(
    State(host): State<Arc<JsonApiHost>>,
    Path(resource_type): Path<String>,
    Query(query): QueryPairs,
) -> Response {
    let result = host.service.get_all(&resource_type, &query).await;
    respond(&host, result)
}

/// GET /{resource_type}/{id}
pub async fn get_by_id(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id)): Path<(String, String)>,
    Query(query): QueryPairs,
) -> Response {
    let result = host.service.get_by_id(&resource_type, &id, &query).await;
    respond(&host, result)
}

/// GET /{resource_type}/{id}/{relationship}
pub async fn get_secondary(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
    Query(query): QueryPairs,
) -> Response {
    let result = host
        .service
        .get_secondary(&resource_type, &id, &relationship, &query)
        .await;
    respond(&host, result)
}

/// GET /{resource_type}/{id}/relationships/{relationship}
pub async fn get_relationship(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
    Query(query): QueryPairs,
) -> Response {
    let result = host
        .service
        .get_relationship(&resource_type, &id, &relationship, &query)
        .await;
    respond(&host, result)
}

/// POST /{resource_type}
pub async fn create(
    State(host): State<Arc<JsonApiHost>>,
    Path(resource_type): Path<String>,
    Query(query): QueryPairs,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match check_content_type(&headers) {
        Ok(()) => host.service.create(&resource_type, &body, &query).await,
        Err(e) => Err(e),
    };
    respond(&host, result)
}

/// PATCH /{resource_type}/{id}
pub async fn update(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id)): Path<(String, String)>,
    Query(query): QueryPairs,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match check_content_type(&headers) {
        Ok(()) => host.service.update(&resource_type, &id, &body, &query).await,
        Err(e) => Err(e),
    };
    respond(&host, result)
}

/// DELETE /{resource_type}/{id}
pub async fn delete(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id)): Path<(String, String)>,
) -> Response {
    let result = host.service.delete(&resource_type, &id).await;
    respond(&host, result)
}

/// PATCH /{resource_type}/{id}/relationships/{relationship}
pub async fn set_relationship(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match check_content_type(&headers) {
        Ok(()) => {
            host.service
                .set_relationship(&resource_type, &id, &relationship, &body)
                .await
        }
        Err(e) => Err(e),
    };
    respond(&host, result)
}

/// POST /{resource_type}/{id}/relationships/{relationship}
pub async fn add_to_relationship(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match check_content_type(&headers) {
        Ok(()) => {
            host.service
                .add_to_relationship(&resource_type, &id, &relationship, &body)
                .await
        }
        Err(e) => Err(e),
    };
    respond(&host, result)
}

/// DELETE /{resource_type}/{id}/relationships/{relationship}
pub async fn remove_from_relationship(
    State(host): State<Arc<JsonApiHost>>,
    Path((resource_type, id, relationship)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match check_content_type(&headers) {
        Ok(()) => {
            host.service
                .remove_from_relationship(&resource_type, &id, &relationship, &body)
                .await
        }
        Err(e) => Err(e),
    };
    respond(&host, result)
}

/// Request bodies must be sent as `application/vnd.api+json`
fn check_content_type(headers: &HeaderMap) -> JsonApiResult<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();

    if media_type.eq_ignore_ascii_case(MEDIA_TYPE) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedMediaType {
            content_type: content_type.to_string(),
        }
        .into())
    }
}

fn respond(host: &JsonApiHost, result: JsonApiResult<JsonApiResponse>) -> Response {
    match result {
        Ok(JsonApiResponse {
            status,
            document: Some(document),
        }) => document_response(status, &document),
        Ok(JsonApiResponse { status, document: None }) => status.into_response(),
        Err(error) => error_response(host, &error),
    }
}

fn error_response(host: &JsonApiHost, error: &JsonApiError) -> Response {
    document_response(error.status_code(), &error.to_document(&host.options))
}

fn document_response(status: StatusCode, document: &Document) -> Response {
    match serde_json::to_vec(document) {
        Ok(body) => (status, [(header::CONTENT_TYPE, MEDIA_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response document");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
