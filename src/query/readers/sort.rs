//! Reader for `sort` and `sort[<chain>]`

use std::sync::Arc;

use super::{
    EndpointKind, QueryConstraintProvider, QueryStringParameterReader, RequestContext,
    bracket_suffix, collection_only, resolve_scope,
};
use crate::core::error::JsonApiResult;
use crate::graph::ResourceGraph;
use crate::query::expression::{Constraint, ExpressionInScope};
use crate::query::parser::parse_sort;

pub struct SortReader {
    graph: Arc<ResourceGraph>,
    resource_type: String,
    endpoint: EndpointKind,
    constraints: Vec<ExpressionInScope>,
}

impl SortReader {
    pub fn new(request: &RequestContext) -> Self {
        Self {
            graph: request.graph.clone(),
            resource_type: request.resource_type.clone(),
            endpoint: request.endpoint,
            constraints: Vec::new(),
        }
    }
}

impl QueryStringParameterReader for SortReader {
    fn can_read(&self, parameter_name: &str) -> bool {
        bracket_suffix(parameter_name, "sort").is_some()
    }

    fn read(&mut self, parameter_name: &str, value: &str) -> JsonApiResult<()> {
        let graph = &self.graph;
        let resource_type = graph.get_resource_type(&self.resource_type)?;

        let (scope, target) = match bracket_suffix(parameter_name, "sort").flatten() {
            Some(scope) => {
                let (chain, target) = resolve_scope(graph, resource_type, parameter_name, scope)?;
                (Some(chain), target)
            }
            None if !self.endpoint.is_collection() => {
                return Err(collection_only(parameter_name).into());
            }
            None => (None, resource_type),
        };

        let sort = parse_sort(graph, target, parameter_name, value)?;
        self.constraints
            .push(ExpressionInScope::new(parameter_name, scope, Constraint::Sort(sort)));
        Ok(())
    }
}

impl QueryConstraintProvider for SortReader {
    fn constraints(&self) -> Vec<ExpressionInScope> {
        self.constraints.clone()
    }
}
