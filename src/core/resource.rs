//! Resource identity and the loaded-resource view shared by the pipeline

use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use uuid::Uuid;

use super::field::{AttrType, FieldValue};

/// Identifier format of a resource type
#[derive(Debug, Clone)]
pub enum IdKind {
    Integer,
    Uuid,
    String,
    /// String identifiers that must match the given pattern
    Custom(Regex),
}

impl IdKind {
    /// Attribute type that identifiers of this kind compare as
    pub fn value_type(&self) -> AttrType {
        match self {
            IdKind::Integer => AttrType::Integer,
            IdKind::Uuid => AttrType::Uuid,
            IdKind::String | IdKind::Custom(_) => AttrType::String,
        }
    }

    /// Parse an identifier in this format
    pub fn parse(&self, value: &str) -> Option<ResourceId> {
        match self {
            IdKind::Integer => value.parse().ok().map(ResourceId::Integer),
            IdKind::Uuid => Uuid::parse_str(value).ok().map(ResourceId::Uuid),
            IdKind::String if !value.is_empty() => Some(ResourceId::String(value.to_string())),
            IdKind::String => None,
            IdKind::Custom(pattern) if pattern.is_match(value) => {
                Some(ResourceId::String(value.to_string()))
            }
            IdKind::Custom(_) => None,
        }
    }
}

/// A resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    Integer(i64),
    Uuid(Uuid),
    String(String),
}

impl ResourceId {
    pub fn to_field_value(&self) -> FieldValue {
        match self {
            ResourceId::Integer(i) => FieldValue::Integer(*i),
            ResourceId::Uuid(u) => FieldValue::Uuid(*u),
            ResourceId::String(s) => FieldValue::String(s.clone()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Integer(i) => write!(f, "{}", i),
            ResourceId::Uuid(u) => write!(f, "{}", u),
            ResourceId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(value: i64) -> Self {
        ResourceId::Integer(value)
    }
}

impl From<i32> for ResourceId {
    fn from(value: i32) -> Self {
        ResourceId::Integer(value.into())
    }
}

impl From<Uuid> for ResourceId {
    fn from(value: Uuid) -> Self {
        ResourceId::Uuid(value)
    }
}

/// A resource as loaded from (or written to) a data source
///
/// Attributes and relationships are keyed by property name. A relationship
/// key that is absent means the relationship was not loaded, which is
/// different from a loaded relationship that turned out to be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub resource_type: String,
    pub id: ResourceId,
    pub attributes: IndexMap<String, FieldValue>,
    pub relationships: IndexMap<String, RelationshipValue>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, id: impl Into<ResourceId>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: IndexMap::new(),
            relationships: IndexMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(
        mut self,
        property: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.attributes.insert(property.into(), value.into());
        self
    }

    /// Builder-style relationship setter
    pub fn with_relationship(
        mut self,
        property: impl Into<String>,
        value: RelationshipValue,
    ) -> Self {
        self.relationships.insert(property.into(), value);
        self
    }

    pub fn attribute(&self, property: &str) -> Option<&FieldValue> {
        self.attributes.get(property)
    }

    pub fn relationship(&self, property: &str) -> Option<&RelationshipValue> {
        self.relationships.get(property)
    }

    /// (type, id) pair that identifies this resource across a document
    pub fn identity(&self) -> (String, ResourceId) {
        (self.resource_type.clone(), self.id.clone())
    }
}

/// Loaded value of a relationship
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipValue {
    ToOne(Option<Box<Resource>>),
    ToMany(Vec<Resource>),
}

impl RelationshipValue {
    /// Related resources in order, regardless of cardinality
    pub fn resources(&self) -> Vec<&Resource> {
        match self {
            RelationshipValue::ToOne(Some(resource)) => vec![resource.as_ref()],
            RelationshipValue::ToOne(None) => Vec::new(),
            RelationshipValue::ToMany(resources) => resources.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_kind_parse() {
        assert_eq!(IdKind::Integer.parse("12"), Some(ResourceId::Integer(12)));
        assert_eq!(IdKind::Integer.parse("abc"), None);
        assert_eq!(IdKind::String.parse(""), None);
        assert!(IdKind::Uuid.parse(&Uuid::new_v4().to_string()).is_some());

        let custom = IdKind::Custom(Regex::new("^[A-Z]{3}$").expect("valid regex"));
        assert_eq!(custom.parse("ABC"), Some(ResourceId::String("ABC".to_string())));
        assert_eq!(custom.parse("abcd"), None);
    }

    #[test]
    fn test_relationship_resources() {
        let tag = Resource::new("tags", 1).with_attribute("name", "rust");
        let value = RelationshipValue::ToMany(vec![tag.clone()]);
        assert_eq!(value.resources(), vec![&tag]);
        assert!(RelationshipValue::ToOne(None).resources().is_empty());
    }
}
