//! Resource graph: the static metadata of every exposed resource type
//!
//! The graph is built once at startup through [`ResourceGraphBuilder`] and is
//! immutable afterwards. Relationships name their target type instead of
//! owning it; the target is looked up through the graph on demand, which lets
//! types refer to each other in cycles (authors ↔ articles).

pub mod builder;

pub use builder::{ResourceGraphBuilder, ResourceTypeBuilder};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{ConfigurationError, JsonApiResult, NotFoundError};
use crate::core::field::AttrType;
use crate::core::resource::IdKind;

/// Public name (and storage column) of the primary key
pub const ID_FIELD: &str = "id";

/// Immutable mapping from public type name to resource type metadata
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    types: IndexMap<String, ResourceType>,
}

impl ResourceGraph {
    pub(crate) fn from_types(types: IndexMap<String, ResourceType>) -> Self {
        Self { types }
    }

    /// Look up a resource type by public name
    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.types.get(name)
    }

    /// Look up a resource type by public name, failing with 404 when unknown
    pub fn get_resource_type(&self, name: &str) -> JsonApiResult<&ResourceType> {
        self.types.get(name).ok_or_else(|| {
            NotFoundError::ResourceType {
                resource_type: name.to_string(),
            }
            .into()
        })
    }

    /// Resolve the target type of a relationship
    pub fn right_type(&self, relationship: &RelationshipMetadata) -> JsonApiResult<&ResourceType> {
        self.types.get(&relationship.right_type).ok_or_else(|| {
            ConfigurationError::UnknownRelationshipTarget {
                resource_type: relationship.left_type.clone(),
                relationship: relationship.public_name.clone(),
                target: relationship.right_type.clone(),
            }
            .into()
        })
    }

    /// All resource types in registration order
    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Metadata of one resource type
#[derive(Debug, Clone)]
pub struct ResourceType {
    pub public_name: String,
    pub id_kind: IdKind,
    pub attributes: Vec<AttrMetadata>,
    pub relationships: Vec<RelationshipMetadata>,
}

impl ResourceType {
    /// The `id` pseudo-attribute, usable in filter and sort expressions
    pub fn id_attribute(&self) -> AttrMetadata {
        AttrMetadata::new(ID_FIELD, self.id_kind.value_type())
            .required()
            .with_capabilities(AttrCapabilities {
                create: false,
                change: false,
                ..AttrCapabilities::default()
            })
    }

    /// Attribute by public name, `id` included
    pub fn queryable_attribute(&self, public_name: &str) -> Option<AttrMetadata> {
        if public_name == ID_FIELD {
            return Some(self.id_attribute());
        }
        self.attribute(public_name).cloned()
    }

    pub fn attribute(&self, public_name: &str) -> Option<&AttrMetadata> {
        self.attributes.iter().find(|a| a.public_name == public_name)
    }

    pub fn relationship(&self, public_name: &str) -> Option<&RelationshipMetadata> {
        self.relationships
            .iter()
            .find(|r| r.public_name == public_name)
    }

    /// Look up an attribute or relationship by public name
    pub fn field(&self, public_name: &str) -> Option<ResourceField<'_>> {
        self.attribute(public_name)
            .map(ResourceField::Attribute)
            .or_else(|| self.relationship(public_name).map(ResourceField::Relationship))
    }

    pub fn attribute_by_property(&self, property_name: &str) -> Option<&AttrMetadata> {
        self.attributes
            .iter()
            .find(|a| a.property_name == property_name)
    }

    pub fn relationship_by_property(&self, property_name: &str) -> Option<&RelationshipMetadata> {
        self.relationships
            .iter()
            .find(|r| r.property_name == property_name)
    }
}

/// A field of a resource type
#[derive(Debug, Clone, Copy)]
pub enum ResourceField<'a> {
    Attribute(&'a AttrMetadata),
    Relationship(&'a RelationshipMetadata),
}

impl ResourceField<'_> {
    pub fn public_name(&self) -> &str {
        match self {
            ResourceField::Attribute(a) => &a.public_name,
            ResourceField::Relationship(r) => &r.public_name,
        }
    }
}

/// What clients may do with an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrCapabilities {
    pub view: bool,
    pub filter: bool,
    pub sort: bool,
    pub create: bool,
    pub change: bool,
}

impl Default for AttrCapabilities {
    fn default() -> Self {
        Self {
            view: true,
            filter: true,
            sort: true,
            create: true,
            change: true,
        }
    }
}

/// Metadata of one attribute
#[derive(Debug, Clone)]
pub struct AttrMetadata {
    pub public_name: String,
    pub property_name: String,
    pub value_type: AttrType,
    pub nullable: bool,
    pub capabilities: AttrCapabilities,
}

impl AttrMetadata {
    /// A nullable attribute with all capabilities, stored under its public name
    pub fn new(public_name: impl Into<String>, value_type: AttrType) -> Self {
        let public_name = public_name.into();
        Self {
            property_name: public_name.clone(),
            public_name,
            value_type,
            nullable: true,
            capabilities: AttrCapabilities::default(),
        }
    }

    pub fn with_property(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = property_name.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_capabilities(mut self, capabilities: AttrCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Cardinality of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    ToOne,
    ToMany,
}

/// Metadata of one relationship
#[derive(Debug, Clone)]
pub struct RelationshipMetadata {
    pub public_name: String,
    pub property_name: String,
    pub kind: RelationshipKind,
    /// Type declaring the relationship
    pub left_type: String,
    /// Public name of the target type, resolved through the graph
    pub right_type: String,
    pub can_include: bool,
    /// Junction table backing a many-to-many relationship
    pub through: Option<String>,
    /// Public name of the relationship on the target type that navigates back
    pub inverse: Option<String>,
    /// Storage side of `inverse`, resolved when the graph is built
    pub inverse_metadata: Option<InverseMetadata>,
}

/// Property name and cardinality of an inverse relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseMetadata {
    pub property_name: String,
    pub kind: RelationshipKind,
}

impl RelationshipMetadata {
    pub fn to_one(public_name: impl Into<String>, right_type: impl Into<String>) -> Self {
        Self::new(public_name.into(), RelationshipKind::ToOne, right_type.into())
    }

    pub fn to_many(public_name: impl Into<String>, right_type: impl Into<String>) -> Self {
        Self::new(public_name.into(), RelationshipKind::ToMany, right_type.into())
    }

    fn new(public_name: String, kind: RelationshipKind, right_type: String) -> Self {
        Self {
            property_name: public_name.clone(),
            public_name,
            kind,
            left_type: String::new(),
            right_type,
            can_include: true,
            through: None,
            inverse: None,
            inverse_metadata: None,
        }
    }

    pub fn with_property(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = property_name.into();
        self
    }

    pub fn not_includable(mut self) -> Self {
        self.can_include = false;
        self
    }

    pub fn through(mut self, junction: impl Into<String>) -> Self {
        self.through = Some(junction.into());
        self
    }

    /// Pair with the relationship `public_name` on the target type
    pub fn inverse_of(mut self, public_name: impl Into<String>) -> Self {
        self.inverse = Some(public_name.into());
        self
    }

    pub fn is_to_many(&self) -> bool {
        self.kind == RelationshipKind::ToMany
    }
}
