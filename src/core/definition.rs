//! Per-resource-type hooks: query constraint adjustments and write callbacks
//!
//! A [`ResourceDefinition`] can narrow what a client asked for but never
//! widen it: injected filters are AND-ed with the request's filter, injected
//! sort orders and paging only apply when the request gave none, and only an
//! explicit [`ConstraintAdjustment::Replace`] overrides a requested constraint.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::JsonApiResult;
use super::resource::ResourceId;
use crate::graph::{ResourceGraph, ResourceType};
use crate::query::expression::{Pagination, QueryExpression, SortExpression};
use crate::query::parser::{FilterParser, parse_sort};
use crate::serialization::deserializer::DeserializedResource;

/// How a hook changes one constraint
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintAdjustment<T> {
    Keep,
    Inject(T),
    Replace(T),
}

impl ConstraintAdjustment<QueryExpression> {
    /// Inject AND-combines with the existing filter; Replace overrides it
    pub fn apply_filter(self, existing: Option<QueryExpression>) -> Option<QueryExpression> {
        match self {
            ConstraintAdjustment::Keep => existing,
            ConstraintAdjustment::Inject(filter) => {
                QueryExpression::and_all(existing.into_iter().chain(std::iter::once(filter)))
            }
            ConstraintAdjustment::Replace(filter) => Some(filter),
        }
    }
}

impl<T> ConstraintAdjustment<T> {
    /// Inject supplies a default when nothing was requested; Replace overrides
    pub fn apply_default(self, existing: Option<T>) -> Option<T> {
        match self {
            ConstraintAdjustment::Keep => existing,
            ConstraintAdjustment::Inject(value) => existing.or(Some(value)),
            ConstraintAdjustment::Replace(value) => Some(value),
        }
    }
}

/// Graph context handed to query hooks, with helpers to build expressions
pub struct QueryContext<'a> {
    pub graph: &'a ResourceGraph,
    pub resource_type: &'a ResourceType,
}

impl<'a> QueryContext<'a> {
    pub fn new(graph: &'a ResourceGraph, resource_type: &'a ResourceType) -> Self {
        Self {
            graph,
            resource_type,
        }
    }

    /// Parse filter syntax against the hooked resource type
    pub fn parse_filter(&self, value: &str) -> JsonApiResult<QueryExpression> {
        FilterParser::parse(self.graph, self.resource_type, "filter", value)
    }

    /// Parse sort syntax against the hooked resource type
    pub fn parse_sort(&self, value: &str) -> JsonApiResult<SortExpression> {
        parse_sort(self.graph, self.resource_type, "sort", value)
    }
}

/// The write operation a write hook runs for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update,
    SetRelationship,
    AddToRelationship,
    RemoveFromRelationship,
    Delete,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteOperation::Create => "create",
            WriteOperation::Update => "update",
            WriteOperation::SetRelationship => "set relationship of",
            WriteOperation::AddToRelationship => "add to relationship of",
            WriteOperation::RemoveFromRelationship => "remove from relationship of",
            WriteOperation::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

/// Hooks for one resource type
///
/// Every method has a no-op default. Query hooks run once per query layer of
/// the hooked type; write hooks run inside the request's unit of work, so an
/// error from either hook rolls the whole write back.
pub trait ResourceDefinition: Send + Sync {
    /// Public name of the hooked resource type
    fn resource_type(&self) -> &str;

    fn on_apply_filter(
        &self,
        _existing: Option<&QueryExpression>,
        _context: &QueryContext<'_>,
    ) -> JsonApiResult<ConstraintAdjustment<QueryExpression>> {
        Ok(ConstraintAdjustment::Keep)
    }

    fn on_apply_sort(
        &self,
        _existing: Option<&SortExpression>,
        _context: &QueryContext<'_>,
    ) -> JsonApiResult<ConstraintAdjustment<SortExpression>> {
        Ok(ConstraintAdjustment::Keep)
    }

    fn on_apply_pagination(
        &self,
        _existing: Option<&Pagination>,
        _context: &QueryContext<'_>,
    ) -> JsonApiResult<ConstraintAdjustment<Pagination>> {
        Ok(ConstraintAdjustment::Keep)
    }

    /// Names of custom query string parameters this type understands
    fn queryable_parameters(&self) -> Vec<String> {
        Vec::new()
    }

    /// Translate a custom query string parameter into a filter adjustment
    fn on_queryable_parameter(
        &self,
        _name: &str,
        _value: &str,
        _context: &QueryContext<'_>,
    ) -> JsonApiResult<ConstraintAdjustment<QueryExpression>> {
        Ok(ConstraintAdjustment::Keep)
    }

    /// Runs before persistence; `changes` is the request body for create and update
    fn on_before_write(
        &self,
        _operation: WriteOperation,
        _id: Option<&ResourceId>,
        _changes: Option<&mut DeserializedResource>,
    ) -> JsonApiResult<()> {
        Ok(())
    }

    /// Runs after persistence, before commit
    fn on_after_write(&self, _operation: WriteOperation, _id: &ResourceId) -> JsonApiResult<()> {
        Ok(())
    }
}

/// Registered resource definitions, by resource type
#[derive(Clone, Default)]
pub struct ResourceDefinitionRegistry {
    definitions: HashMap<String, Arc<dyn ResourceDefinition>>,
}

impl ResourceDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: Arc<dyn ResourceDefinition>) {
        self.definitions
            .insert(definition.resource_type().to_string(), definition);
    }

    pub fn get(&self, resource_type: &str) -> Option<&Arc<dyn ResourceDefinition>> {
        self.definitions.get(resource_type)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

impl fmt::Debug for ResourceDefinitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinitionRegistry")
            .field("resource_types", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::test_graph::graph;

    struct PublishedOnly;

    impl ResourceDefinition for PublishedOnly {
        fn resource_type(&self) -> &str {
            "articles"
        }

        fn on_apply_filter(
            &self,
            _existing: Option<&QueryExpression>,
            context: &QueryContext<'_>,
        ) -> JsonApiResult<ConstraintAdjustment<QueryExpression>> {
            Ok(ConstraintAdjustment::Inject(
                context.parse_filter("not(equals(caption,null))")?,
            ))
        }
    }

    #[test]
    fn test_inject_filter_and_combines() {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");
        let context = QueryContext::new(&graph, articles);

        let requested = context.parse_filter("equals(caption,'X')").expect("valid filter");
        let adjustment = PublishedOnly
            .on_apply_filter(Some(&requested), &context)
            .expect("hook succeeds");
        let combined = adjustment.apply_filter(Some(requested));
        assert_eq!(
            combined.map(|f| f.to_string()),
            Some("and(equals(caption,'X'),not(equals(caption,null)))".to_string())
        );
    }

    #[test]
    fn test_apply_default_only_fills_gaps() {
        let page = Pagination { number: 1, size: 5 };
        let requested = Pagination { number: 2, size: 10 };

        assert_eq!(ConstraintAdjustment::Inject(page).apply_default(None), Some(page));
        assert_eq!(
            ConstraintAdjustment::Inject(page).apply_default(Some(requested)),
            Some(requested)
        );
        assert_eq!(ConstraintAdjustment::Replace(page).apply_default(Some(requested)), Some(page));
        assert_eq!(ConstraintAdjustment::Keep.apply_default(Some(requested)), Some(requested));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ResourceDefinitionRegistry::new();
        registry.register(Arc::new(PublishedOnly));
        assert!(registry.get("articles").is_some());
        assert!(registry.get("tags").is_none());
    }
}
