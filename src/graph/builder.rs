//! Explicit registration API for the resource graph

use indexmap::IndexMap;
use std::collections::HashSet;

use super::{
    AttrMetadata, ID_FIELD, InverseMetadata, RelationshipMetadata, ResourceGraph, ResourceType,
};
use crate::core::error::ConfigurationError;
use crate::core::field::AttrType;
use crate::core::resource::IdKind;

const RESERVED_FIELD_NAMES: [&str; 2] = [ID_FIELD, "type"];

/// Builder for one resource type
///
/// # Example
///
/// ```ignore
/// let articles = ResourceTypeBuilder::new("articles", IdKind::Integer)
///     .attribute(AttrMetadata::new("caption", AttrType::String))
///     .relationship(RelationshipMetadata::to_one("author", "people"))
///     .relationship(RelationshipMetadata::to_many("tags", "tags").through("articleTags"));
/// ```
#[derive(Debug, Clone)]
pub struct ResourceTypeBuilder {
    public_name: String,
    id_kind: IdKind,
    attributes: Vec<AttrMetadata>,
    relationships: Vec<RelationshipMetadata>,
}

impl ResourceTypeBuilder {
    pub fn new(public_name: impl Into<String>, id_kind: IdKind) -> Self {
        Self {
            public_name: public_name.into(),
            id_kind,
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn attribute(mut self, attribute: AttrMetadata) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Shorthand for a nullable attribute with all capabilities
    pub fn attr(self, public_name: &str, value_type: AttrType) -> Self {
        self.attribute(AttrMetadata::new(public_name, value_type))
    }

    pub fn relationship(mut self, relationship: RelationshipMetadata) -> Self {
        self.relationships.push(relationship);
        self
    }

    fn build(self) -> Result<ResourceType, ConfigurationError> {
        let mut seen = HashSet::new();
        let names = self
            .attributes
            .iter()
            .map(|a| &a.public_name)
            .chain(self.relationships.iter().map(|r| &r.public_name));

        for name in names {
            if RESERVED_FIELD_NAMES.contains(&name.as_str()) {
                return Err(ConfigurationError::ReservedFieldName {
                    resource_type: self.public_name.clone(),
                    field: name.clone(),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigurationError::DuplicateField {
                    resource_type: self.public_name.clone(),
                    field: name.clone(),
                });
            }
        }

        let left_type = self.public_name.clone();
        let relationships = self
            .relationships
            .into_iter()
            .map(|mut r| {
                r.left_type = left_type.clone();
                r
            })
            .collect();

        Ok(ResourceType {
            public_name: self.public_name,
            id_kind: self.id_kind,
            attributes: self.attributes,
            relationships,
        })
    }
}

/// Builder for the whole resource graph
///
/// `build()` validates every registration and fails fast; a graph that
/// builds successfully never raises configuration errors at request time.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraphBuilder {
    types: Vec<ResourceTypeBuilder>,
}

impl ResourceGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type
    pub fn resource(mut self, resource_type: ResourceTypeBuilder) -> Self {
        self.types.push(resource_type);
        self
    }

    pub fn build(self) -> Result<ResourceGraph, ConfigurationError> {
        let mut types = IndexMap::new();

        for builder in self.types {
            let resource_type = builder.build()?;
            if types.contains_key(&resource_type.public_name) {
                return Err(ConfigurationError::DuplicateResourceType {
                    resource_type: resource_type.public_name,
                });
            }
            types.insert(resource_type.public_name.clone(), resource_type);
        }

        for resource_type in types.values() {
            for relationship in &resource_type.relationships {
                if !types.contains_key(&relationship.right_type) {
                    return Err(ConfigurationError::UnknownRelationshipTarget {
                        resource_type: resource_type.public_name.clone(),
                        relationship: relationship.public_name.clone(),
                        target: relationship.right_type.clone(),
                    });
                }
            }
        }

        resolve_inverses(&mut types)?;

        tracing::debug!(resource_types = types.len(), "resource graph built");
        Ok(ResourceGraph::from_types(types))
    }
}

/// Check declared inverse pairs and complete the side that did not declare one
fn resolve_inverses(types: &mut IndexMap<String, ResourceType>) -> Result<(), ConfigurationError> {
    let mut pairs = Vec::new();

    for resource_type in types.values() {
        for relationship in &resource_type.relationships {
            let Some(inverse_name) = &relationship.inverse else {
                continue;
            };
            let invalid = |message: String| ConfigurationError::InvalidInverse {
                resource_type: resource_type.public_name.clone(),
                relationship: relationship.public_name.clone(),
                message,
            };

            let inverse = types
                .get(&relationship.right_type)
                .and_then(|target| target.relationship(inverse_name))
                .ok_or_else(|| {
                    invalid(format!(
                        "'{}' is not a relationship of '{}'",
                        inverse_name, relationship.right_type
                    ))
                })?;
            if inverse.right_type != resource_type.public_name {
                return Err(invalid(format!(
                    "'{}.{}' targets '{}'",
                    relationship.right_type, inverse_name, inverse.right_type
                )));
            }
            if inverse
                .inverse
                .as_ref()
                .is_some_and(|back| back != &relationship.public_name)
            {
                return Err(invalid(format!(
                    "'{}.{}' is paired with another relationship",
                    relationship.right_type, inverse_name
                )));
            }
            if inverse.through != relationship.through {
                return Err(invalid("both sides must use the same junction table".to_string()));
            }

            pairs.push((
                (resource_type.public_name.clone(), relationship.public_name.clone()),
                (relationship.right_type.clone(), inverse.public_name.clone()),
            ));
        }
    }

    for (left, right) in pairs {
        let left_side = side_of(types, &left);
        let right_side = side_of(types, &right);
        if let (Some(left_side), Some(right_side)) = (left_side, right_side) {
            pair_with(types, &left, &right.1, right_side);
            pair_with(types, &right, &left.1, left_side);
        }
    }
    Ok(())
}

fn side_of(
    types: &IndexMap<String, ResourceType>,
    (owner, name): &(String, String),
) -> Option<InverseMetadata> {
    types
        .get(owner)
        .and_then(|t| t.relationship(name))
        .map(|r| InverseMetadata {
            property_name: r.property_name.clone(),
            kind: r.kind,
        })
}

fn pair_with(
    types: &mut IndexMap<String, ResourceType>,
    (owner, name): &(String, String),
    inverse: &str,
    metadata: InverseMetadata,
) {
    if let Some(relationship) = types
        .get_mut(owner)
        .and_then(|t| t.relationships.iter_mut().find(|r| &r.public_name == name))
    {
        relationship.inverse = Some(inverse.to_string());
        relationship.inverse_metadata = Some(metadata);
    }
}
