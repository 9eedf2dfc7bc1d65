//! Reader for `include`

use std::sync::Arc;

use super::{EndpointKind, QueryConstraintProvider, QueryStringParameterReader, RequestContext};
use crate::core::error::{JsonApiResult, ValidationError};
use crate::graph::ResourceGraph;
use crate::query::expression::{Constraint, ExpressionInScope, IncludeExpression};
use crate::query::parser::parse_include;

pub struct IncludeReader {
    graph: Arc<ResourceGraph>,
    resource_type: String,
    endpoint: EndpointKind,
    maximum_depth: Option<usize>,
    include: Option<(String, IncludeExpression)>,
}

impl IncludeReader {
    pub fn new(request: &RequestContext) -> Self {
        Self {
            graph: request.graph.clone(),
            resource_type: request.resource_type.clone(),
            endpoint: request.endpoint,
            maximum_depth: request.options.maximum_include_depth,
            include: None,
        }
    }
}

impl QueryStringParameterReader for IncludeReader {
    fn can_read(&self, parameter_name: &str) -> bool {
        parameter_name == "include"
    }

    fn read(&mut self, parameter_name: &str, value: &str) -> JsonApiResult<()> {
        if self.endpoint.is_relationship() {
            return Err(ValidationError::UnsupportedQueryParameter {
                parameter: parameter_name.to_string(),
                message: "Including related resources is not supported on relationship endpoints."
                    .to_string(),
            }
            .into());
        }

        let resource_type = self.graph.get_resource_type(&self.resource_type)?;
        let include = parse_include(
            &self.graph,
            resource_type,
            parameter_name,
            value,
            self.maximum_depth,
        )?;
        self.include = Some((parameter_name.to_string(), include));
        Ok(())
    }
}

impl QueryConstraintProvider for IncludeReader {
    fn constraints(&self) -> Vec<ExpressionInScope> {
        self.include
            .iter()
            .map(|(parameter, include)| {
                let constraint = Constraint::Include(include.clone());
                ExpressionInScope::new(parameter.clone(), None, constraint)
            })
            .collect()
    }
}
