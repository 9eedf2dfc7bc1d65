//! Core module containing the fundamental types of the framework

pub mod definition;
pub mod error;
pub mod field;
pub mod resource;

pub use definition::{
    ConstraintAdjustment, QueryContext, ResourceDefinition, ResourceDefinitionRegistry,
    WriteOperation,
};
pub use error::{JsonApiError, JsonApiResult};
pub use field::{AttrType, FieldValue};
pub use resource::{IdKind, RelationshipValue, Resource, ResourceId};
