//! Recursive-descent parsers for the query string grammars
//!
//! Each parser works on a [`TokenStream`] over one parameter value and
//! reports failures as [`ParseError::QueryString`] carrying the character
//! position of the offending token.

pub mod chain;
pub mod fields;
pub mod filter;
pub mod include;
pub mod pagination;
pub mod sort;

pub use chain::{AttrUse, ChainPattern};
pub use fields::parse_fieldset;
pub use filter::FilterParser;
pub use include::parse_include;
pub use pagination::{PaginationValue, parse_pagination};
pub use sort::parse_sort;

use crate::core::error::{JsonApiError, JsonApiResult, ParseError};
use crate::graph::{ResourceGraph, ResourceType};
use crate::query::expression::FieldChain;
use crate::query::tokenizer::{Token, TokenKind, tokenize};

/// Cursor over the tokens of one parameter value
pub struct TokenStream {
    parameter: String,
    value: String,
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    pub fn new(parameter: &str, value: &str) -> JsonApiResult<Self> {
        Ok(Self {
            parameter: parameter.to_string(),
            value: value.to_string(),
            tokens: tokenize(parameter, value)?,
            position: 0,
        })
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Token `n` positions after the next one
    pub fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    pub fn is_next(&self, kind: &TokenKind) -> bool {
        self.peek().map(|t| &t.kind == kind).unwrap_or(false)
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Offset of the next token, or the end of the value
    pub fn current_offset(&self) -> usize {
        self.peek()
            .map(|t| t.offset)
            .unwrap_or_else(|| self.value.chars().count())
    }

    pub fn error(&self, offset: usize, message: impl Into<String>) -> JsonApiError {
        ParseError::query_string(&self.parameter, &self.value, offset, message).into()
    }

    pub fn expect(&mut self, kind: TokenKind, message: &str) -> JsonApiResult<Token> {
        if self.is_next(&kind) {
            if let Some(token) = self.next_token() {
                return Ok(token);
            }
        }
        Err(self.error(self.current_offset(), message))
    }

    /// Consume an unquoted text token, returning its text and offset
    pub fn expect_text(&mut self, message: &str) -> JsonApiResult<(String, usize)> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Text(text),
                offset,
            }) => {
                let result = (text.clone(), *offset);
                self.position += 1;
                Ok(result)
            }
            _ => Err(self.error(self.current_offset(), message)),
        }
    }

    /// Consume a quoted literal, returning its text and offset
    pub fn expect_quoted(&mut self, message: &str) -> JsonApiResult<(String, usize)> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::QuotedText(text),
                offset,
            }) => {
                let result = (text.clone(), *offset);
                self.position += 1;
                Ok(result)
            }
            _ => Err(self.error(self.current_offset(), message)),
        }
    }

    pub fn expect_end(&self) -> JsonApiResult<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error(self.current_offset(), "End of expression expected."))
        }
    }

    /// Resolve a field chain found at `offset`, mapping failures onto this value
    pub fn resolve_chain(
        &self,
        graph: &ResourceGraph,
        resource_type: &ResourceType,
        path: &str,
        offset: usize,
        pattern: ChainPattern,
        attr_use: Option<AttrUse>,
    ) -> JsonApiResult<FieldChain> {
        chain::resolve_chain(graph, resource_type, path, pattern, attr_use)
            .map_err(|e| self.error(offset + e.offset, e.message))
    }
}
