//! REST API exposure for the framework
//!
//! Consumes a [`JsonApiHost`] and produces an Axum `Router` serving the
//! JSON:API endpoints of every registered resource type under the
//! configured namespace.

mod handlers;

use super::super::host::JsonApiHost;
use anyhow::Result;
use axum::{
    Json, Router,
    routing::get,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with:
    /// - Health check routes
    /// - `/{type}`, `/{type}/{id}`, `/{type}/{id}/{relationship}` and
    ///   `/{type}/{id}/relationships/{relationship}`, prefixed by the namespace
    /// - Custom routes
    pub fn build_router(host: Arc<JsonApiHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let resource_routes = Self::resource_routes(host.clone());

        let base_path = host.base_path();
        let mut app = if base_path.is_empty() {
            Self::health_routes().merge(resource_routes)
        } else {
            Self::health_routes().nest(&base_path, resource_routes)
        };

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    fn resource_routes(host: Arc<JsonApiHost>) -> Router {
        Router::new()
            .route(
                "/{resource_type}",
                get(handlers::get_all).post(handlers::create),
            )
            .route(
                "/{resource_type}/{id}",
                get(handlers::get_by_id)
                    .patch(handlers::update)
                    .delete(handlers::delete),
            )
            .route(
                "/{resource_type}/{id}/{relationship}",
                get(handlers::get_secondary),
            )
            .route(
                "/{resource_type}/{id}/relationships/{relationship}",
                get(handlers::get_relationship)
                    .patch(handlers::set_relationship)
                    .post(handlers::add_to_relationship)
                    .delete(handlers::remove_from_relationship),
            )
            .with_state(host)
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "this-jsonapi"
        }))
    }
}
