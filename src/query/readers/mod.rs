//! Query string readers
//!
//! One reader per parameter family (`filter`, `sort`, `include`, `fields`,
//! `page`, resource-specific parameters). [`QueryStringReader`] hands every
//! parameter to the first reader that accepts it and collects the resulting
//! constraints.

pub mod definition;
pub mod fields;
pub mod filter;
pub mod include;
pub mod pagination;
pub mod sort;

pub use definition::ResourceDefinitionQueryableParameterReader;
pub use fields::SparseFieldSetReader;
pub use filter::FilterReader;
pub use include::IncludeReader;
pub use pagination::PaginationReader;
pub use sort::SortReader;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::JsonApiOptions;
use crate::core::definition::ResourceDefinitionRegistry;
use crate::core::error::{JsonApiResult, ValidationError};
use crate::graph::{ResourceGraph, ResourceType};
use crate::query::expression::{ExpressionInScope, FieldChain};
use crate::query::parser::{ChainPattern, TokenStream};

/// Shape of the endpoint a query string is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// `GET /articles`
    PrimaryCollection,
    /// `GET /articles/1`, and the responses of create/update
    PrimarySingle,
    /// `GET /articles/1/tags`
    SecondaryCollection,
    /// `GET /articles/1/author`
    SecondarySingle,
    /// `GET /articles/1/relationships/tags`
    RelationshipCollection,
    /// `GET /articles/1/relationships/author`
    RelationshipSingle,
}

impl EndpointKind {
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            EndpointKind::PrimaryCollection
                | EndpointKind::SecondaryCollection
                | EndpointKind::RelationshipCollection
        )
    }

    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            EndpointKind::RelationshipCollection | EndpointKind::RelationshipSingle
        )
    }
}

/// What the readers need to know about the current request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub graph: Arc<ResourceGraph>,
    pub options: Arc<JsonApiOptions>,
    /// Type the query string applies to (the secondary type on secondary endpoints)
    pub resource_type: String,
    pub endpoint: EndpointKind,
}

/// Supplies constraints once all parameters are read
pub trait QueryConstraintProvider {
    fn constraints(&self) -> Vec<ExpressionInScope>;
}

/// Reads one family of query string parameters
pub trait QueryStringParameterReader: QueryConstraintProvider + Send {
    fn can_read(&self, parameter_name: &str) -> bool;

    fn read(&mut self, parameter_name: &str, value: &str) -> JsonApiResult<()>;

    fn allows_empty_value(&self) -> bool {
        false
    }
}

/// Dispatches every query string parameter to its reader
pub struct QueryStringReader {
    readers: Vec<Box<dyn QueryStringParameterReader>>,
    allow_unknown: bool,
}

impl QueryStringReader {
    pub fn new(request: &RequestContext, definitions: &ResourceDefinitionRegistry) -> Self {
        let readers: Vec<Box<dyn QueryStringParameterReader>> = vec![
            Box::new(IncludeReader::new(request)),
            Box::new(FilterReader::new(request)),
            Box::new(SortReader::new(request)),
            Box::new(SparseFieldSetReader::new(request)),
            Box::new(PaginationReader::new(request)),
            Box::new(ResourceDefinitionQueryableParameterReader::new(
                request,
                definitions.get(&request.resource_type).cloned(),
            )),
        ];

        Self {
            readers,
            allow_unknown: request.options.allow_unknown_query_string_parameters,
        }
    }

    /// Read all parameters, failing on the first invalid one
    pub fn read(
        mut self,
        parameters: &[(String, String)],
    ) -> JsonApiResult<Vec<ExpressionInScope>> {
        let mut seen = HashSet::new();

        for (name, value) in parameters {
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::DuplicateQueryParameter {
                    parameter: name.clone(),
                }
                .into());
            }

            match self.readers.iter_mut().find(|r| r.can_read(name)) {
                Some(reader) => {
                    if value.is_empty() && !reader.allows_empty_value() {
                        return Err(ValidationError::InvalidQueryParameter {
                            parameter: name.clone(),
                            message: format!(
                                "Missing value for '{}' query string parameter.",
                                name
                            ),
                        }
                        .into());
                    }
                    reader.read(name, value)?;
                }
                None if self.allow_unknown => {
                    tracing::debug!(parameter = %name, "ignoring unknown query string parameter");
                }
                None => {
                    return Err(ValidationError::UnknownQueryParameter {
                        parameter: name.clone(),
                    }
                    .into());
                }
            }
        }

        Ok(self.readers.iter().flat_map(|r| r.constraints()).collect())
    }
}

/// Match `prefix` or `prefix[inner]`, returning the bracketed part
pub(crate) fn bracket_suffix<'a>(name: &'a str, prefix: &str) -> Option<Option<&'a str>> {
    if name == prefix {
        return Some(None);
    }
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('['))
        .and_then(|rest| rest.strip_suffix(']'))
        .map(Some)
}

/// Resolve the relationship chain inside `filter[...]`, `sort[...]`
pub(crate) fn resolve_scope<'g>(
    graph: &'g ResourceGraph,
    resource_type: &'g ResourceType,
    parameter: &str,
    scope: &str,
) -> JsonApiResult<(FieldChain, &'g ResourceType)> {
    let stream = TokenStream::new(parameter, scope)?;
    let chain = stream.resolve_chain(
        graph,
        resource_type,
        scope,
        0,
        ChainPattern::RelationshipsEndingInToMany,
        None,
    )?;
    let target = graph.get_resource_type(chain.target_type(&resource_type.public_name))?;
    Ok((chain, target))
}

pub(crate) fn collection_only(parameter: &str) -> ValidationError {
    ValidationError::UnsupportedQueryParameter {
        parameter: parameter.to_string(),
        message: format!(
            "The parameter '{}' can only be used on a collection of resources (not on a single resource).",
            parameter
        ),
    }
}
