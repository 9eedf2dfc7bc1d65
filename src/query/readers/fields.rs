//! Reader for `fields[<type>]`

use std::sync::Arc;

use super::{
    EndpointKind, QueryConstraintProvider, QueryStringParameterReader, RequestContext,
    bracket_suffix,
};
use crate::core::error::{JsonApiResult, ValidationError};
use crate::graph::ResourceGraph;
use crate::query::expression::{Constraint, ExpressionInScope};
use crate::query::parser::parse_fieldset;

pub struct SparseFieldSetReader {
    graph: Arc<ResourceGraph>,
    endpoint: EndpointKind,
    constraints: Vec<ExpressionInScope>,
}

impl SparseFieldSetReader {
    pub fn new(request: &RequestContext) -> Self {
        Self {
            graph: request.graph.clone(),
            endpoint: request.endpoint,
            constraints: Vec::new(),
        }
    }
}

impl QueryStringParameterReader for SparseFieldSetReader {
    fn can_read(&self, parameter_name: &str) -> bool {
        matches!(bracket_suffix(parameter_name, "fields"), Some(Some(_)))
    }

    fn read(&mut self, parameter_name: &str, value: &str) -> JsonApiResult<()> {
        if self.endpoint.is_relationship() {
            return Err(ValidationError::UnsupportedQueryParameter {
                parameter: parameter_name.to_string(),
                message: "Sparse fieldsets are not supported on relationship endpoints."
                    .to_string(),
            }
            .into());
        }

        let type_name = bracket_suffix(parameter_name, "fields")
            .flatten()
            .unwrap_or_default();
        let resource_type = self.graph.resource_type(type_name).ok_or_else(|| {
            ValidationError::InvalidQueryParameter {
                parameter: parameter_name.to_string(),
                message: format!("Resource type '{}' does not exist.", type_name),
            }
        })?;

        let fields = parse_fieldset(resource_type, parameter_name, value)?;
        self.constraints.push(ExpressionInScope::new(
            parameter_name,
            None,
            Constraint::SparseFieldSet {
                resource_type: resource_type.public_name.clone(),
                fields,
            },
        ));
        Ok(())
    }

    fn allows_empty_value(&self) -> bool {
        true
    }
}

impl QueryConstraintProvider for SparseFieldSetReader {
    fn constraints(&self) -> Vec<ExpressionInScope> {
        self.constraints.clone()
    }
}
