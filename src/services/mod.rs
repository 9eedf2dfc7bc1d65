//! Request handling: query composition, data access and document building

pub mod pipeline;
pub mod resource_service;

pub use pipeline::{Pipeline, PipelineStage};
pub use resource_service::{JsonApiResourceService, JsonApiResponse};
