//! Query string pipeline: tokenizer, parsers, readers and the constraint composer

pub mod composer;
pub mod expression;
pub mod layer;
pub mod parser;
pub mod readers;
pub mod tokenizer;

pub use composer::ConstraintComposer;
pub use expression::{
    ComparisonOperator, Constraint, ExpressionInScope, FieldChain, IncludeElement,
    IncludeExpression, LogicalOperator, Operand, Pagination, PaginationExpression,
    QueryExpression, SortElement, SortExpression, SortTarget, SparseFieldTable, TextMatchKind,
};
pub use layer::QueryLayer;
pub use readers::{EndpointKind, QueryStringReader, RequestContext};
