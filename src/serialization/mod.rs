//! JSON:API document model, serializer and request body deserializer

pub mod deserializer;
pub mod links;
pub mod objects;
pub mod serializer;

pub use deserializer::{
    DeserializedResource, DocumentDeserializer, Linkage, ReadDocument, RelationshipAssignment,
    WriteMode,
};
pub use links::{LinkBuilder, LinkContext};
pub use objects::{
    Document, ErrorObject, ErrorSource, MEDIA_TYPE, PrimaryData, RelationshipData,
    RelationshipObject, ResourceIdentifier, ResourceObject, TopLevelLinks,
};
pub use serializer::DocumentSerializer;
