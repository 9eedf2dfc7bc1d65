//! Composes reader output into a tree of [`QueryLayer`]s
//!
//! The root layer is the requested resource type; one nested layer exists per
//! node of the include tree. Scoped constraints (`filter[tags]`,
//! `page[size]=tags:5`) attach to the layer at their scope, which therefore
//! must be included. Resource definitions get the last word on every layer.

use indexmap::IndexSet;

use crate::config::JsonApiOptions;
use crate::core::definition::{QueryContext, ResourceDefinitionRegistry};
use crate::core::error::{JsonApiError, JsonApiResult, ValidationError};
use crate::graph::{ID_FIELD, ResourceGraph};
use crate::query::expression::{
    Constraint, ExpressionInScope, FieldChain, IncludeElement, IncludeExpression, Operand,
    Pagination, PaginationExpression, QueryExpression, SortExpression, SortTarget,
    SparseFieldTable,
};
use crate::query::layer::QueryLayer;
use crate::query::readers::EndpointKind;

pub struct ConstraintComposer<'a> {
    graph: &'a ResourceGraph,
    options: &'a JsonApiOptions,
    definitions: &'a ResourceDefinitionRegistry,
}

impl<'a> ConstraintComposer<'a> {
    pub fn new(
        graph: &'a ResourceGraph,
        options: &'a JsonApiOptions,
        definitions: &'a ResourceDefinitionRegistry,
    ) -> Self {
        Self {
            graph,
            options,
            definitions,
        }
    }

    /// Build the layer tree for `resource_type` queried at `endpoint`
    pub fn compose(
        &self,
        resource_type: &str,
        endpoint: EndpointKind,
        constraints: &[ExpressionInScope],
    ) -> JsonApiResult<QueryLayer> {
        let mut include = IncludeExpression::default();
        let mut fieldsets = SparseFieldTable::new();
        for expression in constraints {
            match &expression.constraint {
                Constraint::Include(tree) => include.merge(tree),
                Constraint::SparseFieldSet {
                    resource_type,
                    fields,
                } => {
                    fieldsets
                        .entry(resource_type.clone())
                        .or_insert_with(IndexSet::new)
                        .extend(fields.iter().cloned());
                }
                _ => {}
            }
        }

        let mut root = QueryLayer::new(resource_type);
        attach_includes(&mut root, &include.elements);

        if self.options.restrict_queries_to_fieldset && !fieldsets.is_empty() {
            for expression in constraints {
                self.check_fieldset_restriction(resource_type, expression, &fieldsets)?;
            }
        }

        let mut top_level_filters = Vec::new();
        let mut requested_page = None;

        for expression in constraints {
            let path = expression.scope_path();
            match &expression.constraint {
                Constraint::Filter(filter) if path.is_empty() => {
                    top_level_filters.push(filter.clone())
                }
                Constraint::Filter(filter) => {
                    let layer = scoped_layer(&mut root, expression, &path)?;
                    let existing = layer.filter.take().into_iter();
                    layer.filter = QueryExpression::and_all(existing.chain([filter.clone()]));
                }
                Constraint::Sort(sort) => {
                    let layer = scoped_layer(&mut root, expression, &path)?;
                    layer.sort = Some(sort.clone());
                }
                Constraint::Pagination(page) if path.is_empty() => requested_page = Some(*page),
                Constraint::Pagination(page) => {
                    let default_size = self.options.default_page_size;
                    let layer = scoped_layer(&mut root, expression, &path)?;
                    layer.pagination = resolve_page(*page, default_size);
                }
                _ => {}
            }
        }

        root.filter = QueryExpression::and_all(top_level_filters);
        if endpoint.is_collection() {
            root.pagination = resolve_page(
                requested_page.unwrap_or_default(),
                self.options.default_page_size,
            );
        }

        for expression in constraints {
            if let Constraint::Custom(adjustment) = &expression.constraint {
                root.filter = adjustment.clone().apply_filter(root.filter.take());
            }
        }

        self.apply_definitions(&mut root, endpoint.is_collection())?;

        root.for_each_mut(&mut |layer: &mut QueryLayer| {
            layer.fieldset = fieldsets.get(&layer.resource_type).cloned();
            Ok::<(), JsonApiError>(())
        })?;

        tracing::debug!(
            resource_type = %resource_type,
            includes = %include,
            "composed query layers"
        );
        Ok(root)
    }

    /// Run the registered resource definition of each layer, parents first
    fn apply_definitions(&self, layer: &mut QueryLayer, is_collection: bool) -> JsonApiResult<()> {
        let resource_type = self.graph.get_resource_type(&layer.resource_type)?;

        if let Some(definition) = self.definitions.get(&layer.resource_type) {
            let context = QueryContext::new(self.graph, resource_type);

            let filter = definition.on_apply_filter(layer.filter.as_ref(), &context)?;
            layer.filter = filter.apply_filter(layer.filter.take());

            let sort = definition.on_apply_sort(layer.sort.as_ref(), &context)?;
            layer.sort = sort.apply_default(layer.sort.take());

            if is_collection {
                let pagination =
                    definition.on_apply_pagination(layer.pagination.as_ref(), &context)?;
                layer.pagination = pagination
                    .apply_default(layer.pagination.take())
                    .map(Pagination::normalized);
            }
        }

        for (name, child) in layer.include.iter_mut() {
            let to_many = resource_type
                .relationship(name)
                .map(|r| r.is_to_many())
                .unwrap_or(false);
            self.apply_definitions(child, to_many)?;
        }
        Ok(())
    }

    /// Filters and sorts may only use attributes inside requested fieldsets
    fn check_fieldset_restriction(
        &self,
        resource_type: &str,
        expression: &ExpressionInScope,
        fieldsets: &SparseFieldTable,
    ) -> JsonApiResult<()> {
        let start = expression
            .scope
            .as_ref()
            .map(|scope| scope.target_type(resource_type))
            .unwrap_or(resource_type);

        let mut used = Vec::new();
        match &expression.constraint {
            Constraint::Filter(filter) => collect_filter_attributes(filter, start, &mut used),
            Constraint::Sort(sort) => collect_sort_attributes(sort, start, &mut used),
            _ => return Ok(()),
        }

        for (owner, attribute) in used {
            if let Some(fields) = fieldsets.get(&owner) {
                if !fields.contains(&attribute) {
                    return Err(ValidationError::InvalidQueryParameter {
                        parameter: expression.parameter.clone(),
                        message: format!(
                            "Attribute '{}' of resource type '{}' is used in '{}' but excluded by its sparse fieldset.",
                            attribute, owner, expression.parameter
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn attach_includes(layer: &mut QueryLayer, elements: &[IncludeElement]) {
    for element in elements {
        let child = layer
            .include
            .entry(element.relationship.public_name.clone())
            .or_insert_with(|| QueryLayer::new(element.relationship.right_type.clone()));
        attach_includes(child, &element.children);
    }
}

fn scoped_layer<'l>(
    root: &'l mut QueryLayer,
    expression: &ExpressionInScope,
    path: &[String],
) -> JsonApiResult<&'l mut QueryLayer> {
    root.layer_at_mut(path).ok_or_else(|| {
        ValidationError::InvalidQueryParameter {
            parameter: expression.parameter.clone(),
            message: format!(
                "Using '{}' requires the relationship chain '{}' to be included.",
                expression.parameter,
                path.join(".")
            ),
        }
        .into()
    })
}

/// Page number defaults to 1; no size and no default means unpaged
fn resolve_page(page: PaginationExpression, default_size: Option<usize>) -> Option<Pagination> {
    page.size.or(default_size).map(|size| Pagination {
        number: page.number.unwrap_or(1),
        size,
    })
}

fn push_attribute(chain: &FieldChain, start: &str, used: &mut Vec<(String, String)>) {
    if let Some(attribute) = chain.attribute.as_ref().filter(|a| a.public_name != ID_FIELD) {
        used.push((chain.owner_type(start).to_string(), attribute.public_name.clone()));
    }
}

fn collect_filter_attributes(
    filter: &QueryExpression,
    start: &str,
    used: &mut Vec<(String, String)>,
) {
    match filter {
        QueryExpression::Comparison { left, right, .. } => {
            for operand in [left, right] {
                if let Operand::Field(chain) = operand {
                    push_attribute(chain, start, used);
                }
            }
        }
        QueryExpression::Logical { terms, .. } => {
            for term in terms {
                collect_filter_attributes(term, start, used);
            }
        }
        QueryExpression::Not(inner) => collect_filter_attributes(inner, start, used),
        QueryExpression::Has { target, filter } => {
            if let Some(filter) = filter {
                collect_filter_attributes(filter, target.target_type(start), used);
            }
        }
        QueryExpression::MatchText { target, .. } | QueryExpression::Any { target, .. } => {
            push_attribute(target, start, used)
        }
    }
}

fn collect_sort_attributes(sort: &SortExpression, start: &str, used: &mut Vec<(String, String)>) {
    for element in &sort.elements {
        if let SortTarget::Field(chain) = &element.target {
            push_attribute(chain, start, used);
        }
    }
}
