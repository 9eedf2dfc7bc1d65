//! Reader for custom parameters declared by a resource definition

use std::sync::Arc;

use super::{QueryConstraintProvider, QueryStringParameterReader, RequestContext};
use crate::core::definition::{QueryContext, ResourceDefinition};
use crate::core::error::JsonApiResult;
use crate::graph::ResourceGraph;
use crate::query::expression::{Constraint, ExpressionInScope};

pub struct ResourceDefinitionQueryableParameterReader {
    graph: Arc<ResourceGraph>,
    resource_type: String,
    definition: Option<Arc<dyn ResourceDefinition>>,
    parameters: Vec<String>,
    constraints: Vec<ExpressionInScope>,
}

impl ResourceDefinitionQueryableParameterReader {
    pub fn new(request: &RequestContext, definition: Option<Arc<dyn ResourceDefinition>>) -> Self {
        let parameters = definition
            .as_ref()
            .map(|d| d.queryable_parameters())
            .unwrap_or_default();
        Self {
            graph: request.graph.clone(),
            resource_type: request.resource_type.clone(),
            definition,
            parameters,
            constraints: Vec::new(),
        }
    }
}

impl QueryStringParameterReader for ResourceDefinitionQueryableParameterReader {
    fn can_read(&self, parameter_name: &str) -> bool {
        self.parameters.iter().any(|p| p == parameter_name)
    }

    fn read(&mut self, parameter_name: &str, value: &str) -> JsonApiResult<()> {
        let Some(definition) = &self.definition else {
            return Ok(());
        };
        let resource_type = self.graph.get_resource_type(&self.resource_type)?;
        let context = QueryContext::new(&self.graph, resource_type);
        let adjustment = definition.on_queryable_parameter(parameter_name, value, &context)?;
        self.constraints.push(ExpressionInScope::new(
            parameter_name,
            None,
            Constraint::Custom(adjustment),
        ));
        Ok(())
    }
}

impl QueryConstraintProvider for ResourceDefinitionQueryableParameterReader {
    fn constraints(&self) -> Vec<ExpressionInScope> {
        self.constraints.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::ConstraintAdjustment;
    use crate::query::expression::QueryExpression;
    use crate::query::readers::EndpointKind;
    use crate::query::readers::test_support::request;

    struct LongArticles;

    impl ResourceDefinition for LongArticles {
        fn resource_type(&self) -> &str {
            "articles"
        }

        fn queryable_parameters(&self) -> Vec<String> {
            vec!["isLong".to_string()]
        }

        fn on_queryable_parameter(
            &self,
            _name: &str,
            value: &str,
            context: &QueryContext<'_>,
        ) -> JsonApiResult<ConstraintAdjustment<QueryExpression>> {
            if value == "true" {
                Ok(ConstraintAdjustment::Inject(
                    context.parse_filter("greaterThan(wordCount,'1000')")?,
                ))
            } else {
                Ok(ConstraintAdjustment::Keep)
            }
        }
    }

    #[test]
    fn test_custom_parameter_becomes_filter_adjustment() {
        let mut reader = ResourceDefinitionQueryableParameterReader::new(
            &request("articles", EndpointKind::PrimaryCollection),
            Some(Arc::new(LongArticles)),
        );
        assert!(reader.can_read("isLong"));
        assert!(!reader.can_read("isShort"));

        reader.read("isLong", "true").expect("should read");
        match &reader.constraints()[0].constraint {
            Constraint::Custom(ConstraintAdjustment::Inject(filter)) => {
                assert_eq!(filter.to_string(), "greaterThan(wordCount,'1000')");
            }
            other => panic!("unexpected constraint: {:?}", other),
        }
    }

    #[test]
    fn test_no_definition_reads_nothing() {
        let reader = ResourceDefinitionQueryableParameterReader::new(
            &request("articles", EndpointKind::PrimaryCollection),
            None,
        );
        assert!(!reader.can_read("isLong"));
    }
}
