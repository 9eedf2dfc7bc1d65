//! Wire-level JSON:API document model

use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

/// The JSON:API media type
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

/// Non-standard meta information
pub type Meta = IndexMap<String, Value>;

/// Top-level document
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Document {
    #[serde(skip_serializing_if = "PrimaryData::is_absent")]
    pub data: PrimaryData,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<ResourceObject>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<TopLevelLinks>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorObject>>,
}

impl Document {
    pub fn from_errors(errors: Vec<ErrorObject>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::default()
        }
    }
}

/// Primary data of a document
///
/// The shape follows the endpoint, not the number of results: a collection
/// endpoint always renders an array and a single-resource endpoint renders an
/// object or `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PrimaryData {
    #[default]
    Absent,
    Single(Option<Box<ResourceObject>>),
    Collection(Vec<ResourceObject>),
}

impl PrimaryData {
    pub fn is_absent(&self) -> bool {
        matches!(self, PrimaryData::Absent)
    }

    pub fn resources(&self) -> Vec<&ResourceObject> {
        match self {
            PrimaryData::Absent | PrimaryData::Single(None) => Vec::new(),
            PrimaryData::Single(Some(object)) => vec![object.as_ref()],
            PrimaryData::Collection(objects) => objects.iter().collect(),
        }
    }
}

impl Serialize for PrimaryData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PrimaryData::Absent | PrimaryData::Single(None) => serializer.serialize_none(),
            PrimaryData::Single(Some(object)) => object.serialize(serializer),
            PrimaryData::Collection(objects) => objects.serialize(serializer),
        }
    }
}

/// A resource object; with only `type` and `id` set it is a resource identifier
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: String,

    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<IndexMap<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<IndexMap<String, RelationshipObject>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<ResourceLinks>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ResourceObject {
    pub fn identifier(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: None,
            relationships: None,
            links: None,
            meta: None,
        }
    }
}

/// Identifier used in relationship linkage
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

/// Relationship linkage; `NotLoaded` omits the `data` member entirely
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RelationshipData {
    #[default]
    NotLoaded,
    ToOne(Option<ResourceIdentifier>),
    ToMany(Vec<ResourceIdentifier>),
}

impl RelationshipData {
    pub fn is_not_loaded(&self) -> bool {
        matches!(self, RelationshipData::NotLoaded)
    }
}

impl Serialize for RelationshipData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationshipData::NotLoaded | RelationshipData::ToOne(None) => {
                serializer.serialize_none()
            }
            RelationshipData::ToOne(Some(identifier)) => identifier.serialize(serializer),
            RelationshipData::ToMany(identifiers) => identifiers.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RelationshipObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<RelationshipLinks>,

    #[serde(skip_serializing_if = "RelationshipData::is_not_loaded")]
    pub data: RelationshipData,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ResourceLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RelationshipLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub related: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct TopLevelLinks {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// A single error occurrence
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_loaded_linkage_omits_data() {
        let object = RelationshipObject {
            links: Some(RelationshipLinks {
                self_link: "/articles/1/relationships/tags".to_string(),
                related: "/articles/1/tags".to_string(),
            }),
            ..RelationshipObject::default()
        };
        let value = serde_json::to_value(&object).expect("serializable");
        assert!(value.get("data").is_none());

        let empty = RelationshipObject {
            data: RelationshipData::ToMany(Vec::new()),
            ..RelationshipObject::default()
        };
        assert_eq!(serde_json::to_value(&empty).expect("serializable"), json!({ "data": [] }));

        let null = RelationshipObject {
            data: RelationshipData::ToOne(None),
            ..RelationshipObject::default()
        };
        assert_eq!(serde_json::to_value(&null).expect("serializable"), json!({ "data": null }));
    }

    #[test]
    fn test_single_null_primary_data_is_rendered() {
        let document = Document {
            data: PrimaryData::Single(None),
            ..Document::default()
        };
        assert_eq!(serde_json::to_value(&document).expect("serializable"), json!({ "data": null }));

        let errors = Document::from_errors(Vec::new());
        let value = serde_json::to_value(&errors).expect("serializable");
        assert!(value.get("data").is_none());
    }
}
