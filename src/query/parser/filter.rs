//! Parser for `filter` and `filter[<scope>]` values

use super::{AttrUse, ChainPattern, TokenStream};
use crate::core::error::JsonApiResult;
use crate::core::field::{AttrType, FieldValue};
use crate::graph::{ResourceGraph, ResourceType};
use crate::query::expression::{
    ComparisonOperator, FieldChain, LogicalOperator, Operand, QueryExpression, TextMatchKind,
};
use crate::query::tokenizer::{Token, TokenKind};

pub struct FilterParser<'g> {
    graph: &'g ResourceGraph,
    stream: TokenStream,
}

impl<'g> FilterParser<'g> {
    /// Parse a complete filter value against `resource_type`
    pub fn parse(
        graph: &'g ResourceGraph,
        resource_type: &'g ResourceType,
        parameter: &str,
        value: &str,
    ) -> JsonApiResult<QueryExpression> {
        let mut parser = Self {
            graph,
            stream: TokenStream::new(parameter, value)?,
        };
        let expression = parser.parse_filter(resource_type)?;
        parser.stream.expect_end()?;
        Ok(expression)
    }

    fn parse_filter(&mut self, resource_type: &'g ResourceType) -> JsonApiResult<QueryExpression> {
        let (name, offset) = self.stream.expect_text("Filter function expected.")?;

        if let Some(operator) = ComparisonOperator::from_keyword(&name) {
            return self.parse_comparison(operator, resource_type);
        }
        if let Some(kind) = TextMatchKind::from_keyword(&name) {
            return self.parse_text_match(kind, resource_type);
        }

        match name.as_str() {
            "and" => self.parse_logical(LogicalOperator::And, resource_type),
            "or" => self.parse_logical(LogicalOperator::Or, resource_type),
            "not" => self.parse_not(resource_type),
            "has" => self.parse_has(resource_type),
            "any" => self.parse_any(resource_type),
            _ => Err(self.stream.error(
                offset,
                format!("Filter function expected, found '{}'.", name),
            )),
        }
    }

    fn parse_comparison(
        &mut self,
        operator: ComparisonOperator,
        resource_type: &'g ResourceType,
    ) -> JsonApiResult<QueryExpression> {
        self.open()?;

        let left = if self.is_count_function() {
            Operand::Count(self.parse_count(resource_type)?)
        } else {
            Operand::Field(self.parse_chain(
                resource_type,
                ChainPattern::ToOneThenAttribute,
                "Count function or field name expected.",
            )?)
        };

        self.comma()?;

        let right = match self.stream.peek().cloned() {
            Some(Token {
                kind: TokenKind::Text(text),
                offset,
            }) if text == "null" => {
                if operator != ComparisonOperator::Equals || !matches!(left, Operand::Field(_)) {
                    return Err(self.stream.error(
                        offset,
                        "null is only allowed when testing an attribute with equals.",
                    ));
                }
                self.stream.next_token();
                Operand::Null
            }
            Some(Token {
                kind: TokenKind::QuotedText(text),
                offset,
            }) => {
                self.stream.next_token();
                let target = match &left {
                    Operand::Field(chain) => chain
                        .attribute
                        .as_ref()
                        .map(|a| a.value_type)
                        .unwrap_or(AttrType::String),
                    _ => AttrType::Integer,
                };
                Operand::Literal(self.convert(&text, offset, target)?)
            }
            _ if self.is_count_function() => Operand::Count(self.parse_count(resource_type)?),
            _ => Operand::Field(self.parse_chain(
                resource_type,
                ChainPattern::ToOneThenAttribute,
                "Count function, value between quotes, null or field name expected.",
            )?),
        };

        self.close()?;
        Ok(QueryExpression::Comparison {
            operator,
            left,
            right,
        })
    }

    fn parse_logical(
        &mut self,
        operator: LogicalOperator,
        resource_type: &'g ResourceType,
    ) -> JsonApiResult<QueryExpression> {
        self.open()?;
        let mut terms = vec![self.parse_filter(resource_type)?];
        self.comma()?;
        terms.push(self.parse_filter(resource_type)?);
        while self.stream.is_next(&TokenKind::Comma) {
            self.stream.next_token();
            terms.push(self.parse_filter(resource_type)?);
        }
        self.close()?;
        Ok(QueryExpression::Logical { operator, terms })
    }

    fn parse_not(&mut self, resource_type: &'g ResourceType) -> JsonApiResult<QueryExpression> {
        self.open()?;
        let inner = self.parse_filter(resource_type)?;
        self.close()?;
        Ok(QueryExpression::Not(Box::new(inner)))
    }

    fn parse_has(&mut self, resource_type: &'g ResourceType) -> JsonApiResult<QueryExpression> {
        self.open()?;
        let target = self.parse_chain(
            resource_type,
            ChainPattern::ToOneThenToMany,
            "To-many relationship expected.",
        )?;

        let filter = if self.stream.is_next(&TokenKind::Comma) {
            self.stream.next_token();
            let offset = self.stream.current_offset();
            let nested_type = self
                .graph
                .resource_type(target.target_type(&resource_type.public_name))
                .ok_or_else(|| self.stream.error(offset, "Unknown relationship target."))?;
            Some(Box::new(self.parse_filter(nested_type)?))
        } else {
            None
        };

        self.close()?;
        Ok(QueryExpression::Has { target, filter })
    }

    fn parse_text_match(
        &mut self,
        kind: TextMatchKind,
        resource_type: &'g ResourceType,
    ) -> JsonApiResult<QueryExpression> {
        self.open()?;
        let offset = self.stream.current_offset();
        let target = self.parse_chain(
            resource_type,
            ChainPattern::ToOneThenAttribute,
            "Field name expected.",
        )?;
        if target.attribute.as_ref().map(|a| a.value_type) != Some(AttrType::String) {
            return Err(self.stream.error(offset, "Attribute of type 'String' expected."));
        }
        self.comma()?;
        let (text, _) = self.stream.expect_quoted("Value between quotes expected.")?;
        self.close()?;
        Ok(QueryExpression::MatchText { kind, target, text })
    }

    fn parse_any(&mut self, resource_type: &'g ResourceType) -> JsonApiResult<QueryExpression> {
        self.open()?;
        let target = self.parse_chain(
            resource_type,
            ChainPattern::ToOneThenAttribute,
            "Field name expected.",
        )?;
        let value_type = target
            .attribute
            .as_ref()
            .map(|a| a.value_type)
            .unwrap_or(AttrType::String);

        self.comma()?;
        let mut constants = Vec::new();
        loop {
            let (text, offset) = self.stream.expect_quoted("Value between quotes expected.")?;
            constants.push(self.convert(&text, offset, value_type)?);
            if !self.stream.is_next(&TokenKind::Comma) {
                break;
            }
            self.stream.next_token();
        }

        self.close()?;
        Ok(QueryExpression::Any { target, constants })
    }

    fn parse_count(&mut self, resource_type: &'g ResourceType) -> JsonApiResult<FieldChain> {
        self.stream.next_token();
        self.open()?;
        let chain = self.parse_chain(
            resource_type,
            ChainPattern::ToOneThenToMany,
            "To-many relationship expected.",
        )?;
        self.close()?;
        Ok(chain)
    }

    fn parse_chain(
        &mut self,
        resource_type: &'g ResourceType,
        pattern: ChainPattern,
        message: &str,
    ) -> JsonApiResult<FieldChain> {
        let (path, offset) = self.stream.expect_text(message)?;
        let attr_use = (pattern == ChainPattern::ToOneThenAttribute).then_some(AttrUse::Filter);
        self.stream
            .resolve_chain(self.graph, resource_type, &path, offset, pattern, attr_use)
    }

    fn convert(&self, text: &str, offset: usize, target: AttrType) -> JsonApiResult<FieldValue> {
        target.parse_literal(text).ok_or_else(|| {
            self.stream.error(
                offset,
                format!(
                    "Failed to convert '{}' of type 'String' to type '{}'.",
                    text,
                    target.name()
                ),
            )
        })
    }

    fn is_count_function(&self) -> bool {
        matches!(
            self.stream.peek(),
            Some(Token { kind: TokenKind::Text(text), .. }) if text == "count"
        )
            && matches!(self.stream.peek_ahead(1), Some(Token { kind: TokenKind::OpenParen, .. }))
    }

    fn open(&mut self) -> JsonApiResult<()> {
        self.stream.expect(TokenKind::OpenParen, "( expected.").map(|_| ())
    }

    fn close(&mut self) -> JsonApiResult<()> {
        self.stream.expect(TokenKind::CloseParen, ") expected.").map(|_| ())
    }

    fn comma(&mut self) -> JsonApiResult<()> {
        self.stream.expect(TokenKind::Comma, ", expected.").map(|_| ())
    }
}
