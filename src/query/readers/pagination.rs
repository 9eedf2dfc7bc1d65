//! Reader for `page[number]` and `page[size]`
//!
//! Both parameters accept `value` or `chain:value` elements; elements for the
//! same scope are merged into one [`PaginationExpression`].

use indexmap::IndexMap;
use std::sync::Arc;

use super::{
    EndpointKind, QueryConstraintProvider, QueryStringParameterReader, RequestContext,
    collection_only,
};
use crate::config::{JsonApiOptions, PageSizeOverflow};
use crate::core::error::{JsonApiResult, ParseError};
use crate::graph::ResourceGraph;
use crate::query::expression::{Constraint, ExpressionInScope, FieldChain, PaginationExpression};
use crate::query::parser::parse_pagination;

const PAGE_NUMBER: &str = "page[number]";
const PAGE_SIZE: &str = "page[size]";

struct ScopedPage {
    parameter: String,
    scope: Option<FieldChain>,
    page: PaginationExpression,
}

pub struct PaginationReader {
    graph: Arc<ResourceGraph>,
    options: Arc<JsonApiOptions>,
    resource_type: String,
    endpoint: EndpointKind,
    pages: IndexMap<Vec<String>, ScopedPage>,
}

impl PaginationReader {
    pub fn new(request: &RequestContext) -> Self {
        Self {
            graph: request.graph.clone(),
            options: request.options.clone(),
            resource_type: request.resource_type.clone(),
            endpoint: request.endpoint,
            pages: IndexMap::new(),
        }
    }

    fn check_number(
        &self,
        parameter: &str,
        value: &str,
        offset: usize,
        number: usize,
    ) -> JsonApiResult<usize> {
        match self.options.maximum_page_number {
            Some(maximum) if number > maximum => Err(ParseError::query_string(
                parameter,
                value,
                offset,
                format!("Page number cannot be higher than {}.", maximum),
            )
            .into()),
            _ => Ok(number),
        }
    }

    /// The first row of the page must be addressable
    fn check_offset(
        &self,
        parameter: &str,
        value: &str,
        offset: usize,
        number: Option<usize>,
        size: Option<usize>,
    ) -> JsonApiResult<()> {
        let (Some(number), Some(size)) = (number, size.or(self.options.default_page_size)) else {
            return Ok(());
        };
        match number.saturating_sub(1).checked_mul(size) {
            Some(_) => Ok(()),
            None => Err(ParseError::query_string(
                parameter,
                value,
                offset,
                format!("Page number {} with page size {} is out of range.", number, size),
            )
            .into()),
        }
    }

    fn check_size(
        &self,
        parameter: &str,
        value: &str,
        offset: usize,
        size: usize,
    ) -> JsonApiResult<usize> {
        match self.options.maximum_page_size {
            Some(maximum) if size > maximum => match self.options.page_size_overflow {
                PageSizeOverflow::Reject => Err(ParseError::query_string(
                    parameter,
                    value,
                    offset,
                    format!("Page size cannot be higher than {}.", maximum),
                )
                .into()),
                PageSizeOverflow::Clamp => {
                    tracing::debug!(requested = size, maximum, "clamping page size");
                    Ok(maximum)
                }
            },
            _ => Ok(size),
        }
    }
}

impl QueryStringParameterReader for PaginationReader {
    fn can_read(&self, parameter_name: &str) -> bool {
        parameter_name == PAGE_NUMBER || parameter_name == PAGE_SIZE
    }

    fn read(&mut self, parameter_name: &str, value: &str) -> JsonApiResult<()> {
        let resource_type = self.graph.get_resource_type(&self.resource_type)?;
        let values = parse_pagination(&self.graph, resource_type, parameter_name, value)?;

        for element in values {
            if element.scope.is_none() && !self.endpoint.is_collection() {
                return Err(collection_only(parameter_name).into());
            }

            let (number, size) = if parameter_name == PAGE_NUMBER {
                let number =
                    self.check_number(parameter_name, value, element.offset, element.value)?;
                (Some(number), None)
            } else {
                let size = self.check_size(parameter_name, value, element.offset, element.value)?;
                (None, Some(size))
            };

            let key: Vec<String> = element
                .scope
                .as_ref()
                .map(|chain| chain.public_names().into_iter().map(String::from).collect())
                .unwrap_or_default();
            let existing = self.pages.get(&key).map(|scoped| scoped.page).unwrap_or_default();
            self.check_offset(
                parameter_name,
                value,
                element.offset,
                number.or(existing.number),
                size.or(existing.size),
            )?;
            let entry = self.pages.entry(key).or_insert_with(|| ScopedPage {
                parameter: parameter_name.to_string(),
                scope: element.scope.clone(),
                page: PaginationExpression::default(),
            });
            if number.is_some() {
                entry.page.number = number;
            }
            if size.is_some() {
                entry.page.size = size;
            }
        }
        Ok(())
    }
}

impl QueryConstraintProvider for PaginationReader {
    fn constraints(&self) -> Vec<ExpressionInScope> {
        self.pages
            .values()
            .map(|scoped| {
                ExpressionInScope::new(
                    scoped.parameter.clone(),
                    scoped.scope.clone(),
                    Constraint::Pagination(scoped.page),
                )
            })
            .collect()
    }
}
