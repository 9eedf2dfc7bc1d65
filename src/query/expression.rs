//! Provider-agnostic constraint model produced by the query string readers
//!
//! Every field reference is a [`FieldChain`] already resolved against the
//! resource graph, so later stages never look names up again. `Display`
//! renders each expression back in query string syntax.

use indexmap::{IndexMap, IndexSet};
use std::fmt;

use crate::core::definition::ConstraintAdjustment;
use crate::core::field::FieldValue;
use crate::graph::{AttrMetadata, RelationshipMetadata};

/// A dot-separated path of relationships, optionally ending in an attribute
#[derive(Debug, Clone)]
pub struct FieldChain {
    pub relationships: Vec<RelationshipMetadata>,
    pub attribute: Option<AttrMetadata>,
}

impl FieldChain {
    /// Public names along the chain
    pub fn public_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .relationships
            .iter()
            .map(|r| r.public_name.as_str())
            .collect();
        if let Some(attribute) = &self.attribute {
            names.push(&attribute.public_name);
        }
        names
    }

    /// Type that owns the final element, given the type the chain starts at
    pub fn owner_type<'a>(&'a self, start_type: &'a str) -> &'a str {
        let relationships = if self.attribute.is_some() {
            &self.relationships[..]
        } else {
            &self.relationships[..self.relationships.len().saturating_sub(1)]
        };
        relationships
            .last()
            .map(|r| r.right_type.as_str())
            .unwrap_or(start_type)
    }

    /// Type reached at the end of a relationship-only chain
    pub fn target_type<'a>(&'a self, start_type: &'a str) -> &'a str {
        self.relationships
            .last()
            .map(|r| r.right_type.as_str())
            .unwrap_or(start_type)
    }
}

impl PartialEq for FieldChain {
    fn eq(&self, other: &Self) -> bool {
        self.public_names() == other.public_names()
    }
}

impl fmt::Display for FieldChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.public_names().join("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl ComparisonOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            ComparisonOperator::Equals => "equals",
            ComparisonOperator::LessThan => "lessThan",
            ComparisonOperator::LessOrEqual => "lessOrEqual",
            ComparisonOperator::GreaterThan => "greaterThan",
            ComparisonOperator::GreaterOrEqual => "greaterOrEqual",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "equals" => Some(ComparisonOperator::Equals),
            "lessThan" => Some(ComparisonOperator::LessThan),
            "lessOrEqual" => Some(ComparisonOperator::LessOrEqual),
            "greaterThan" => Some(ComparisonOperator::GreaterThan),
            "greaterOrEqual" => Some(ComparisonOperator::GreaterOrEqual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatchKind {
    Contains,
    StartsWith,
    EndsWith,
}

impl TextMatchKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            TextMatchKind::Contains => "contains",
            TextMatchKind::StartsWith => "startsWith",
            TextMatchKind::EndsWith => "endsWith",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "contains" => Some(TextMatchKind::Contains),
            "startsWith" => Some(TextMatchKind::StartsWith),
            "endsWith" => Some(TextMatchKind::EndsWith),
            _ => None,
        }
    }

    pub fn matches(&self, value: &str, text: &str) -> bool {
        match self {
            TextMatchKind::Contains => value.contains(text),
            TextMatchKind::StartsWith => value.starts_with(text),
            TextMatchKind::EndsWith => value.ends_with(text),
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Attribute reached through zero or more to-one relationships
    Field(FieldChain),
    Literal(FieldValue),
    Null,
    /// Number of resources in a to-many relationship
    Count(FieldChain),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(chain) => write!(f, "{}", chain),
            Operand::Literal(value) => write_literal(f, value),
            Operand::Null => write!(f, "null"),
            Operand::Count(chain) => write!(f, "count({})", chain),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &FieldValue) -> fmt::Result {
    write!(f, "'{}'", value.to_literal_text().replace('\'', "''"))
}

/// Boolean filter expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpression {
    Comparison {
        operator: ComparisonOperator,
        left: Operand,
        right: Operand,
    },
    Logical {
        operator: LogicalOperator,
        terms: Vec<QueryExpression>,
    },
    Not(Box<QueryExpression>),
    /// Whether a to-many relationship has any (matching) resources
    Has {
        target: FieldChain,
        filter: Option<Box<QueryExpression>>,
    },
    MatchText {
        kind: TextMatchKind,
        target: FieldChain,
        text: String,
    },
    /// Set membership
    Any {
        target: FieldChain,
        constants: Vec<FieldValue>,
    },
}

impl QueryExpression {
    /// AND-combine, flattening nested conjunctions; `None` when empty
    pub fn and_all(terms: impl IntoIterator<Item = QueryExpression>) -> Option<QueryExpression> {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                QueryExpression::Logical {
                    operator: LogicalOperator::And,
                    terms,
                } => flat.extend(terms),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(QueryExpression::Logical {
                operator: LogicalOperator::And,
                terms: flat,
            }),
        }
    }
}

impl fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpression::Comparison {
                operator,
                left,
                right,
            } => write!(f, "{}({},{})", operator.keyword(), left, right),
            QueryExpression::Logical { operator, terms } => {
                let keyword = match operator {
                    LogicalOperator::And => "and",
                    LogicalOperator::Or => "or",
                };
                let terms: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
                write!(f, "{}({})", keyword, terms.join(","))
            }
            QueryExpression::Not(inner) => write!(f, "not({})", inner),
            QueryExpression::Has { target, filter } => match filter {
                Some(filter) => write!(f, "has({},{})", target, filter),
                None => write!(f, "has({})", target),
            },
            QueryExpression::MatchText { kind, target, text } => {
                write!(f, "{}({},", kind.keyword(), target)?;
                write_literal(f, &FieldValue::String(text.clone()))?;
                write!(f, ")")
            }
            QueryExpression::Any { target, constants } => {
                write!(f, "any({}", target)?;
                for constant in constants {
                    write!(f, ",")?;
                    write_literal(f, constant)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// What a sort element orders by
#[derive(Debug, Clone, PartialEq)]
pub enum SortTarget {
    Field(FieldChain),
    Count(FieldChain),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortElement {
    pub target: SortTarget,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortExpression {
    pub elements: Vec<SortElement>,
}

impl fmt::Display for SortExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .elements
            .iter()
            .map(|element| {
                let prefix = if element.ascending { "" } else { "-" };
                match &element.target {
                    SortTarget::Field(chain) => format!("{}{}", prefix, chain),
                    SortTarget::Count(chain) => format!("{}count({})", prefix, chain),
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Node of the include tree
#[derive(Debug, Clone)]
pub struct IncludeElement {
    pub relationship: RelationshipMetadata,
    pub children: Vec<IncludeElement>,
}

/// The include tree requested by the client
#[derive(Debug, Clone, Default)]
pub struct IncludeExpression {
    pub elements: Vec<IncludeElement>,
}

impl IncludeExpression {
    /// Merge a relationship chain into the tree
    pub fn add_chain(&mut self, chain: &[RelationshipMetadata]) {
        let mut level = &mut self.elements;
        for relationship in chain {
            let index = match level
                .iter()
                .position(|e| e.relationship.public_name == relationship.public_name)
            {
                Some(index) => index,
                None => {
                    level.push(IncludeElement {
                        relationship: relationship.clone(),
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            level = &mut level[index].children;
        }
    }

    /// Merge another tree into this one
    pub fn merge(&mut self, other: &IncludeExpression) {
        fn walk(
            target: &mut IncludeExpression,
            prefix: &mut Vec<RelationshipMetadata>,
            elements: &[IncludeElement],
        ) {
            for element in elements {
                prefix.push(element.relationship.clone());
                target.add_chain(prefix);
                walk(target, prefix, &element.children);
                prefix.pop();
            }
        }
        walk(self, &mut Vec::new(), &other.elements);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl fmt::Display for IncludeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn collect(prefix: &str, elements: &[IncludeElement], out: &mut Vec<String>) {
            for element in elements {
                let path = if prefix.is_empty() {
                    element.relationship.public_name.clone()
                } else {
                    format!("{}.{}", prefix, element.relationship.public_name)
                };
                if element.children.is_empty() {
                    out.push(path);
                } else {
                    collect(&path, &element.children, out);
                }
            }
        }
        let mut paths = Vec::new();
        collect("", &self.elements, &mut paths);
        write!(f, "{}", paths.join(","))
    }
}

/// Requested fields per resource type
pub type SparseFieldTable = IndexMap<String, IndexSet<String>>;

/// Page number and/or size, as given for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationExpression {
    pub number: Option<usize>,
    pub size: Option<usize>,
}

/// Resolved paging of one query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// One-based page number
    pub number: usize,
    pub size: usize,
}

impl Pagination {
    pub fn skip(&self) -> usize {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }

    /// Raise a zero number or size to 1
    pub fn normalized(self) -> Self {
        Self {
            number: self.number.max(1),
            size: self.size.max(1),
        }
    }
}

/// One constraint produced by a reader
#[derive(Debug, Clone)]
pub enum Constraint {
    Filter(QueryExpression),
    Sort(SortExpression),
    Include(IncludeExpression),
    SparseFieldSet {
        resource_type: String,
        fields: IndexSet<String>,
    },
    Pagination(PaginationExpression),
    /// Filter adjustment contributed by a resource-specific query parameter
    Custom(ConstraintAdjustment<QueryExpression>),
}

/// A constraint together with the relationship chain it is scoped to
///
/// `scope` is `None` for constraints on the requested resource type itself.
#[derive(Debug, Clone)]
pub struct ExpressionInScope {
    pub parameter: String,
    pub scope: Option<FieldChain>,
    pub constraint: Constraint,
}

impl ExpressionInScope {
    pub fn new(
        parameter: impl Into<String>,
        scope: Option<FieldChain>,
        constraint: Constraint,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            scope,
            constraint,
        }
    }

    /// Relationship names of the scope, empty for the top level
    pub fn scope_path(&self) -> Vec<String> {
        self.scope
            .as_ref()
            .map(|chain| chain.public_names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::AttrType;

    fn caption() -> FieldChain {
        FieldChain {
            relationships: Vec::new(),
            attribute: Some(AttrMetadata::new("caption", AttrType::String)),
        }
    }

    #[test]
    fn test_display_escapes_quotes() {
        let expression = QueryExpression::Comparison {
            operator: ComparisonOperator::Equals,
            left: Operand::Field(caption()),
            right: Operand::Literal(FieldValue::from("it's")),
        };
        assert_eq!(expression.to_string(), "equals(caption,'it''s')");
    }

    #[test]
    fn test_and_all_flattens() {
        let a = QueryExpression::Comparison {
            operator: ComparisonOperator::Equals,
            left: Operand::Field(caption()),
            right: Operand::Null,
        };
        let nested = QueryExpression::and_all(vec![a.clone(), a.clone()]).expect("two terms");
        let combined = QueryExpression::and_all(vec![nested, a.clone()]).expect("three terms");
        match combined {
            QueryExpression::Logical { terms, .. } => assert_eq!(terms.len(), 3),
            other => panic!("expected and(), got {}", other),
        }
        assert_eq!(QueryExpression::and_all(vec![a.clone()]), Some(a));
        assert_eq!(QueryExpression::and_all(Vec::new()), None);
    }

    #[test]
    fn test_include_tree_merges_chains() {
        let author = RelationshipMetadata::to_one("author", "people");
        let articles = RelationshipMetadata::to_many("articles", "articles");
        let tags = RelationshipMetadata::to_many("tags", "tags");

        let mut include = IncludeExpression::default();
        include.add_chain(&[author.clone(), articles.clone()]);
        include.add_chain(&[author.clone()]);
        include.add_chain(&[tags.clone()]);

        assert_eq!(include.elements.len(), 2);
        assert_eq!(include.to_string(), "author.articles,tags");
    }
}
