//! Resolution of dot-separated field chains against the resource graph

use crate::graph::{RelationshipKind, ResourceGraph, ResourceType};
use crate::query::expression::FieldChain;

/// Shape a field chain must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPattern {
    /// Zero or more to-one relationships, then an attribute (`author.name`)
    ToOneThenAttribute,
    /// Zero or more to-one relationships, then a to-many relationship
    ToOneThenToMany,
    /// One or more relationships of any kind (include paths)
    Relationships,
    /// One or more relationships, the last one to-many (constraint scopes)
    RelationshipsEndingInToMany,
}

/// Capability the final attribute must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrUse {
    Filter,
    Sort,
}

/// Resolution failure at a character offset within the chain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainError {
    pub offset: usize,
    pub message: String,
}

impl ChainError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

pub fn resolve_chain(
    graph: &ResourceGraph,
    start: &ResourceType,
    path: &str,
    pattern: ChainPattern,
    attr_use: Option<AttrUse>,
) -> Result<FieldChain, ChainError> {
    let mut segments = Vec::new();
    let mut offset = 0;
    for segment in path.split('.') {
        segments.push((segment, offset));
        offset += segment.chars().count() + 1;
    }

    let mut chain = FieldChain {
        relationships: Vec::new(),
        attribute: None,
    };
    let mut current = start;

    for (index, (name, offset)) in segments.iter().enumerate() {
        let (name, offset) = (*name, *offset);
        if name.is_empty() {
            return Err(ChainError::new(offset, "Field name expected."));
        }

        let is_last = index + 1 == segments.len();

        if is_last && pattern == ChainPattern::ToOneThenAttribute {
            let Some(attribute) = current.queryable_attribute(name) else {
                let message = if current.relationship(name).is_some() {
                    format!(
                        "Field '{}' must be an attribute on resource type '{}'.",
                        name, current.public_name
                    )
                } else {
                    format!(
                        "Attribute '{}' does not exist on resource type '{}'.",
                        name, current.public_name
                    )
                };
                return Err(ChainError::new(offset, message));
            };

            match attr_use {
                Some(AttrUse::Filter) if !attribute.capabilities.filter => {
                    return Err(ChainError::new(
                        offset,
                        format!("Filtering on attribute '{}' is not allowed.", name),
                    ));
                }
                Some(AttrUse::Sort) if !attribute.capabilities.sort => {
                    return Err(ChainError::new(
                        offset,
                        format!("Sorting on attribute '{}' is not allowed.", name),
                    ));
                }
                _ => {}
            }

            chain.attribute = Some(attribute);
            break;
        }

        let Some(relationship) = current.relationship(name) else {
            let message = if current.attribute(name).is_some() {
                format!(
                    "Field '{}' must be a relationship on resource type '{}'.",
                    name, current.public_name
                )
            } else {
                format!(
                    "Relationship '{}' does not exist on resource type '{}'.",
                    name, current.public_name
                )
            };
            return Err(ChainError::new(offset, message));
        };

        let required = match pattern {
            ChainPattern::ToOneThenAttribute => Some(RelationshipKind::ToOne),
            ChainPattern::ToOneThenToMany if is_last => Some(RelationshipKind::ToMany),
            ChainPattern::ToOneThenToMany => Some(RelationshipKind::ToOne),
            ChainPattern::RelationshipsEndingInToMany if is_last => Some(RelationshipKind::ToMany),
            _ => None,
        };
        if let Some(kind) = required {
            if relationship.kind != kind {
                let expected = match kind {
                    RelationshipKind::ToOne => "to-one",
                    RelationshipKind::ToMany => "to-many",
                };
                return Err(ChainError::new(
                    offset,
                    format!(
                        "Relationship '{}' must be a {} relationship on resource type '{}'.",
                        name, expected, current.public_name
                    ),
                ));
            }
        }

        chain.relationships.push(relationship.clone());

        current = graph
            .right_type(relationship)
            .map_err(|e| ChainError::new(offset, e.to_string()))?;
    }

    Ok(chain)
}
