//! Data-source query plans and their composition from query layers
//!
//! A [`QueryPlan`] speaks in tables, columns and navigations (property
//! names), not in public names: it is what a [`DataSource`](super::DataSource)
//! executes. [`QueryLayerComposer`] performs the translation.

use crate::core::error::{JsonApiResult, NotFoundError};
use crate::core::field::FieldValue;
use crate::core::resource::ResourceId;
use crate::graph::{ID_FIELD, RelationshipKind, RelationshipMetadata, ResourceGraph, ResourceType};
use crate::query::expression::{
    ComparisonOperator, FieldChain, LogicalOperator, Operand, QueryExpression, SortExpression,
    SortTarget, TextMatchKind,
};
use crate::query::layer::QueryLayer;

/// A relationship as the data source sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Property name on the owning table
    pub property: String,
    /// Table of the related rows
    pub target: String,
    pub to_many: bool,
    /// Junction table backing a many-to-many navigation
    pub through: Option<String>,
    /// Navigation on the target table that must mirror writes to this one
    pub inverse: Option<InverseNavigation>,
}

/// Property on the related rows pointing back at the owning row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseNavigation {
    pub property: String,
    pub to_many: bool,
}

impl From<&RelationshipMetadata> for Navigation {
    fn from(relationship: &RelationshipMetadata) -> Self {
        // junction rows are shared by both sides already
        let inverse = match (&relationship.through, &relationship.inverse_metadata) {
            (None, Some(inverse)) => Some(InverseNavigation {
                property: inverse.property_name.clone(),
                to_many: inverse.kind == RelationshipKind::ToMany,
            }),
            _ => None,
        };
        Self {
            property: relationship.property_name.clone(),
            target: relationship.right_type.clone(),
            to_many: relationship.is_to_many(),
            through: relationship.through.clone(),
            inverse,
        }
    }
}

/// A column reached through zero or more to-one navigations
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPath {
    pub navigations: Vec<Navigation>,
    pub column: String,
}

impl ColumnPath {
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            navigations: Vec::new(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOperand {
    Column(ColumnPath),
    Value(FieldValue),
    Null,
    /// Number of rows behind a to-many navigation chain
    Count(Vec<Navigation>),
}

/// Row predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        operator: ComparisonOperator,
        left: PlanOperand,
        right: PlanOperand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// At least one row behind the navigation chain matches
    Exists {
        path: Vec<Navigation>,
        predicate: Option<Box<Predicate>>,
    },
    In {
        column: ColumnPath,
        values: Vec<FieldValue>,
    },
    Text {
        kind: TextMatchKind,
        column: ColumnPath,
        text: String,
    },
}

impl Predicate {
    /// `id = <id>`
    pub fn id_equals(id: &ResourceId) -> Self {
        Predicate::Compare {
            operator: ComparisonOperator::Equals,
            left: PlanOperand::Column(ColumnPath::column(ID_FIELD)),
            right: PlanOperand::Value(id.to_field_value()),
        }
    }

    /// AND two optional predicates
    pub fn and(left: Option<Predicate>, right: Predicate) -> Predicate {
        match left {
            None => right,
            Some(Predicate::And(mut terms)) => {
                terms.push(right);
                Predicate::And(terms)
            }
            Some(left) => Predicate::And(vec![left, right]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    Column(ColumnPath),
    Count(Vec<Navigation>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub target: OrderTarget,
    pub ascending: bool,
}

/// Related rows to load alongside each result row
#[derive(Debug, Clone, PartialEq)]
pub struct EagerLoad {
    pub navigation: Navigation,
    /// Filter, order and paging applied to each parent's related rows separately
    pub plan: QueryPlan,
}

/// Everything a data source needs to answer one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub table: String,
    pub predicate: Option<Predicate>,
    pub order: Vec<OrderKey>,
    pub skip: usize,
    pub take: Option<usize>,
    /// Attribute columns to load (`None` loads all)
    pub projection: Option<Vec<String>>,
    pub eager_loads: Vec<EagerLoad>,
}

impl QueryPlan {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicate: None,
            order: Vec::new(),
            skip: 0,
            take: None,
            projection: None,
            eager_loads: Vec::new(),
        }
    }
}

/// Translates [`QueryLayer`]s into [`QueryPlan`]s
pub struct QueryLayerComposer<'a> {
    graph: &'a ResourceGraph,
}

impl<'a> QueryLayerComposer<'a> {
    pub fn new(graph: &'a ResourceGraph) -> Self {
        Self { graph }
    }

    pub fn compose(&self, layer: &QueryLayer) -> JsonApiResult<QueryPlan> {
        let resource_type = self.graph.get_resource_type(&layer.resource_type)?;

        let mut plan = QueryPlan::new(&resource_type.public_name);
        plan.predicate = layer.filter.as_ref().map(translate_filter);
        plan.order = translate_sort(layer.sort.as_ref());
        if let Some(pagination) = layer.pagination {
            plan.skip = pagination.skip();
            plan.take = Some(pagination.size);
        }
        plan.projection = layer.fieldset.as_ref().map(|fields| {
            resource_type
                .attributes
                .iter()
                .filter(|a| fields.contains(&a.public_name))
                .map(|a| a.property_name.clone())
                .collect()
        });

        for (name, child) in &layer.include {
            let relationship = relationship_of(resource_type, name)?;
            plan.eager_loads.push(EagerLoad {
                navigation: Navigation::from(relationship),
                plan: self.compose(child)?,
            });
        }

        Ok(plan)
    }

    /// Plan for one primary resource
    pub fn compose_by_id(&self, layer: &QueryLayer, id: &ResourceId) -> JsonApiResult<QueryPlan> {
        let mut plan = self.compose(layer)?;
        plan.predicate = Some(Predicate::and(plan.predicate.take(), Predicate::id_equals(id)));
        plan.skip = 0;
        plan.take = None;
        Ok(plan)
    }

    /// Plan for the resources behind a relationship of one primary resource
    ///
    /// Loads the primary row without attributes and eager-loads the secondary
    /// layer through the relationship.
    pub fn compose_secondary(
        &self,
        primary_type: &ResourceType,
        id: &ResourceId,
        relationship: &RelationshipMetadata,
        secondary: &QueryLayer,
    ) -> JsonApiResult<QueryPlan> {
        let mut plan = QueryPlan::new(&primary_type.public_name);
        plan.predicate = Some(Predicate::id_equals(id));
        plan.projection = Some(Vec::new());
        plan.eager_loads.push(EagerLoad {
            navigation: Navigation::from(relationship),
            plan: self.compose(secondary)?,
        });
        Ok(plan)
    }

    /// Predicate used for the total count of a primary collection
    pub fn count_predicate(&self, layer: &QueryLayer) -> Option<Predicate> {
        layer.filter.as_ref().map(translate_filter)
    }
}

fn relationship_of<'t>(
    resource_type: &'t ResourceType,
    name: &str,
) -> JsonApiResult<&'t RelationshipMetadata> {
    resource_type.relationship(name).ok_or_else(|| {
        NotFoundError::Relationship {
            resource_type: resource_type.public_name.clone(),
            relationship: name.to_string(),
        }
        .into()
    })
}

fn navigations(chain: &FieldChain) -> Vec<Navigation> {
    chain.relationships.iter().map(Navigation::from).collect()
}

fn column_path(chain: &FieldChain) -> ColumnPath {
    ColumnPath {
        navigations: navigations(chain),
        column: chain
            .attribute
            .as_ref()
            .map(|a| a.property_name.clone())
            .unwrap_or_else(|| ID_FIELD.to_string()),
    }
}

fn translate_operand(operand: &Operand) -> PlanOperand {
    match operand {
        Operand::Field(chain) => PlanOperand::Column(column_path(chain)),
        Operand::Literal(value) => PlanOperand::Value(value.clone()),
        Operand::Null => PlanOperand::Null,
        Operand::Count(chain) => PlanOperand::Count(navigations(chain)),
    }
}

fn translate_filter(filter: &QueryExpression) -> Predicate {
    match filter {
        QueryExpression::Comparison {
            operator,
            left,
            right,
        } => Predicate::Compare {
            operator: *operator,
            left: translate_operand(left),
            right: translate_operand(right),
        },
        QueryExpression::Logical { operator, terms } => {
            let terms = terms.iter().map(translate_filter).collect();
            match operator {
                LogicalOperator::And => Predicate::And(terms),
                LogicalOperator::Or => Predicate::Or(terms),
            }
        }
        QueryExpression::Not(inner) => Predicate::Not(Box::new(translate_filter(inner))),
        QueryExpression::Has { target, filter } => Predicate::Exists {
            path: navigations(target),
            predicate: filter.as_ref().map(|f| Box::new(translate_filter(f))),
        },
        QueryExpression::MatchText { kind, target, text } => Predicate::Text {
            kind: *kind,
            column: column_path(target),
            text: text.clone(),
        },
        QueryExpression::Any { target, constants } => Predicate::In {
            column: column_path(target),
            values: constants.clone(),
        },
    }
}

/// Requested order, terminated by `id` ascending unless `id` is already a key
fn translate_sort(sort: Option<&SortExpression>) -> Vec<OrderKey> {
    let mut order: Vec<OrderKey> = sort
        .map(|sort| {
            sort.elements
                .iter()
                .map(|element| OrderKey {
                    target: match &element.target {
                        SortTarget::Field(chain) => OrderTarget::Column(column_path(chain)),
                        SortTarget::Count(chain) => OrderTarget::Count(navigations(chain)),
                    },
                    ascending: element.ascending,
                })
                .collect()
        })
        .unwrap_or_default();

    let has_id_key = order.iter().any(|key| {
        matches!(
            &key.target,
            OrderTarget::Column(path) if path.navigations.is_empty() && path.column == ID_FIELD
        )
    });
    if !has_id_key {
        order.push(OrderKey {
            target: OrderTarget::Column(ColumnPath::column(ID_FIELD)),
            ascending: true,
        });
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::expression::Pagination;
    use crate::query::parser::test_graph::graph;
    use crate::query::parser::{FilterParser, parse_sort};
    use indexmap::IndexSet;

    #[test]
    fn test_filter_translates_to_property_columns() {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");
        let mut layer = QueryLayer::new("articles");
        let filter = "and(equals(author.name,'Ann'),has(tags))";
        layer.filter =
            Some(FilterParser::parse(&graph, articles, "filter", filter).expect("valid filter"));

        let plan = QueryLayerComposer::new(&graph).compose(&layer).expect("should compose");
        match plan.predicate {
            Some(Predicate::And(terms)) => {
                assert_eq!(terms.len(), 2);
                match &terms[0] {
                    Predicate::Compare {
                        left: PlanOperand::Column(path),
                        ..
                    } => {
                        assert_eq!(path.navigations[0].property, "author");
                        assert_eq!(path.navigations[0].target, "people");
                        assert_eq!(path.column, "name");
                    }
                    other => panic!("unexpected predicate: {:?}", other),
                }
                assert!(matches!(&terms[1], Predicate::Exists { predicate: None, .. }));
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_order_ends_with_id_ascending() {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");

        let mut layer = QueryLayer::new("articles");
        layer.sort = Some(parse_sort(&graph, articles, "sort", "-caption").expect("valid sort"));
        let plan = QueryLayerComposer::new(&graph).compose(&layer).expect("should compose");
        assert_eq!(plan.order.len(), 2);
        assert!(!plan.order[0].ascending);
        assert_eq!(
            plan.order[1],
            OrderKey {
                target: OrderTarget::Column(ColumnPath::column(ID_FIELD)),
                ascending: true
            }
        );

        layer.sort = Some(parse_sort(&graph, articles, "sort", "-id").expect("valid sort"));
        let plan = QueryLayerComposer::new(&graph).compose(&layer).expect("should compose");
        assert_eq!(plan.order.len(), 1);
    }

    #[test]
    fn test_paging_projection_and_eager_loads() {
        let graph = graph();
        let mut layer = QueryLayer::new("articles");
        layer.pagination = Some(Pagination { number: 3, size: 5 });
        layer.fieldset = Some(IndexSet::from(["caption".to_string(), "tags".to_string()]));
        let mut tags = QueryLayer::new("tags");
        tags.pagination = Some(Pagination { number: 1, size: 2 });
        layer.include.insert("tags".to_string(), tags);

        let plan = QueryLayerComposer::new(&graph).compose(&layer).expect("should compose");
        assert_eq!(plan.skip, 10);
        assert_eq!(plan.take, Some(5));
        assert_eq!(plan.projection, Some(vec!["caption".to_string()]));
        assert_eq!(plan.eager_loads.len(), 1);
        assert!(plan.eager_loads[0].navigation.to_many);
        assert_eq!(plan.eager_loads[0].plan.take, Some(2));
    }

    #[test]
    fn test_secondary_plan_loads_through_relationship() {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");
        let tags = articles.relationship("tags").expect("declared");

        let plan = QueryLayerComposer::new(&graph)
            .compose_secondary(articles, &ResourceId::Integer(7), tags, &QueryLayer::new("tags"))
            .expect("should compose");
        assert_eq!(plan.table, "articles");
        assert_eq!(plan.predicate, Some(Predicate::id_equals(&ResourceId::Integer(7))));
        assert_eq!(plan.projection, Some(Vec::new()));
        assert_eq!(plan.eager_loads[0].plan.table, "tags");
    }
}
