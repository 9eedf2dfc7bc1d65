//! Reader for `filter` and `filter[<chain>]`

use std::sync::Arc;

use super::{
    EndpointKind, QueryConstraintProvider, QueryStringParameterReader, RequestContext,
    bracket_suffix, collection_only, resolve_scope,
};
use crate::core::error::JsonApiResult;
use crate::graph::ResourceGraph;
use crate::query::expression::{Constraint, ExpressionInScope};
use crate::query::parser::FilterParser;

pub struct FilterReader {
    graph: Arc<ResourceGraph>,
    resource_type: String,
    endpoint: EndpointKind,
    constraints: Vec<ExpressionInScope>,
}

impl FilterReader {
    pub fn new(request: &RequestContext) -> Self {
        Self {
            graph: request.graph.clone(),
            resource_type: request.resource_type.clone(),
            endpoint: request.endpoint,
            constraints: Vec::new(),
        }
    }
}

impl QueryStringParameterReader for FilterReader {
    fn can_read(&self, parameter_name: &str) -> bool {
        bracket_suffix(parameter_name, "filter").is_some()
    }

    fn read(&mut self, parameter_name: &str, value: &str) -> JsonApiResult<()> {
        let graph = &self.graph;
        let resource_type = graph.get_resource_type(&self.resource_type)?;

        let (scope, target) = match bracket_suffix(parameter_name, "filter").flatten() {
            Some(scope) => {
                let (chain, target) = resolve_scope(graph, resource_type, parameter_name, scope)?;
                (Some(chain), target)
            }
            None => {
                if !self.endpoint.is_collection() {
                    return Err(collection_only(parameter_name).into());
                }
                (None, resource_type)
            }
        };

        let filter = FilterParser::parse(graph, target, parameter_name, value)?;
        self.constraints.push(ExpressionInScope::new(
            parameter_name,
            scope,
            Constraint::Filter(filter),
        ));
        Ok(())
    }
}

impl QueryConstraintProvider for FilterReader {
    fn constraints(&self) -> Vec<ExpressionInScope> {
        self.constraints.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{JsonApiError, ValidationError};
    use crate::query::readers::test_support::request;

    #[test]
    fn test_read_top_level_and_scoped_filters() {
        let mut reader = FilterReader::new(&request("articles", EndpointKind::PrimaryCollection));
        reader
            .read("filter", "equals(caption,'Hello')")
            .expect("should read top-level filter");
        reader
            .read("filter[tags]", "startsWith(name,'ru')")
            .expect("should read scoped filter");

        let constraints = reader.constraints();
        assert_eq!(constraints.len(), 2);
        assert!(constraints[0].scope.is_none());
        assert_eq!(constraints[1].scope_path(), vec!["tags".to_string()]);
        match &constraints[1].constraint {
            Constraint::Filter(filter) => assert_eq!(filter.to_string(), "startsWith(name,'ru')"),
            other => panic!("unexpected constraint: {:?}", other),
        }
    }

    #[test]
    fn test_scope_must_end_in_to_many() {
        let mut reader = FilterReader::new(&request("articles", EndpointKind::PrimaryCollection));
        let err = reader
            .read("filter[author]", "equals(name,'x')")
            .expect_err("to-one scope");
        assert!(matches!(err, JsonApiError::Parse(_)));
    }

    #[test]
    fn test_top_level_filter_rejected_on_single_resource() {
        let mut reader = FilterReader::new(&request("articles", EndpointKind::PrimarySingle));
        let err = reader
            .read("filter", "equals(caption,'x')")
            .expect_err("single resource endpoint");
        assert!(matches!(
            err,
            JsonApiError::Validation(ValidationError::UnsupportedQueryParameter { .. })
        ));

        reader
            .read("filter[tags]", "equals(name,'x')")
            .expect("scoped filters are fine on single resources");
    }
}
