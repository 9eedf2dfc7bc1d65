//! # This JSON:API
//!
//! A server-side JSON:API framework: register resource types in a resource
//! graph, and every request is taken through the same pipeline.
//!
//! ## Features
//!
//! - **Resource Graph**: explicit registration of types, attributes and relationships, validated at startup
//! - **Query String Readers**: `filter`, `sort`, `include`, `fields[type]`, `page[number]`, `page[size]` and custom parameters
//! - **Query Layers**: per-type constraint trees translated into data-source query plans
//! - **Documents**: compound documents with `included` deduplication, sparse fieldsets and links
//! - **Request Bodies**: validated against the graph with JSON pointers in every error
//! - **Transactional Writes**: one unit of work per request with before/after hooks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jsonapi::prelude::*;
//!
//! let graph = ResourceGraphBuilder::new()
//!     .resource(
//!         ResourceTypeBuilder::new("articles", IdKind::Integer)
//!             .attr("caption", AttrType::String)
//!             .relationship(RelationshipMetadata::to_many("tags", "tags")),
//!     )
//!     .resource(ResourceTypeBuilder::new("tags", IdKind::Integer).attr("name", AttrType::String))
//!     .build()?;
//!
//! ServerBuilder::new()
//!     .with_graph(graph)
//!     .with_data_source(InMemoryDataSource::new())
//!     .serve("127.0.0.1:3000")
//!     .await?;
//!
//! // GET /articles?include=tags&filter=equals(caption,'Hello')&fields[articles]=caption
//! ```

pub mod config;
pub mod core;
pub mod graph;
pub mod query;
pub mod serialization;
pub mod server;
pub mod services;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        AttrType, ConstraintAdjustment, FieldValue, IdKind, JsonApiError, JsonApiResult,
        QueryContext, RelationshipValue, Resource, ResourceDefinition, ResourceId,
        WriteOperation,
    };

    // === Resource Graph ===
    pub use crate::graph::{
        AttrCapabilities, AttrMetadata, RelationshipKind, RelationshipMetadata, ResourceGraph,
        ResourceGraphBuilder, ResourceType, ResourceTypeBuilder,
    };

    // === Query ===
    pub use crate::query::{EndpointKind, QueryExpression, QueryLayer, SortExpression};

    // === Documents ===
    pub use crate::serialization::{Document, MEDIA_TYPE};

    // === Services & Storage ===
    pub use crate::services::{JsonApiResourceService, JsonApiResponse};
    pub use crate::storage::{DataSource, InMemoryDataSource, QueryPlan, UnitOfWork};

    // === Config ===
    pub use crate::config::{JsonApiOptions, PageSizeOverflow, ResourceGraphConfig};

    // === Server ===
    pub use crate::server::{JsonApiHost, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
}
