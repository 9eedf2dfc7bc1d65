//! Parser for `page[number]` and `page[size]` values

use super::{ChainPattern, TokenStream};
use crate::core::error::JsonApiResult;
use crate::graph::{ResourceGraph, ResourceType};
use crate::query::expression::FieldChain;
use crate::query::tokenizer::{Token, TokenKind};

/// One `value` or `chain:value` element
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationValue {
    pub scope: Option<FieldChain>,
    pub value: usize,
    /// Character offset of the number
    pub offset: usize,
}

/// Parse a comma list of positive integers, optionally scoped to to-many chains
pub fn parse_pagination(
    graph: &ResourceGraph,
    resource_type: &ResourceType,
    parameter: &str,
    value: &str,
) -> JsonApiResult<Vec<PaginationValue>> {
    let mut stream = TokenStream::new(parameter, value)?;
    let mut values: Vec<PaginationValue> = Vec::new();

    loop {
        let (text, offset) = stream.expect_text("Value expected.")?;

        let (scope, number_text, number_offset) =
            if matches!(stream.peek(), Some(Token { kind: TokenKind::Colon, .. })) {
                stream.next_token();
                let chain = stream.resolve_chain(
                    graph,
                    resource_type,
                    &text,
                    offset,
                    ChainPattern::RelationshipsEndingInToMany,
                    None,
                )?;
                let (number_text, number_offset) = stream.expect_text("Value expected.")?;
                (Some(chain), number_text, number_offset)
            } else {
                (None, text, offset)
            };

        let number = match number_text.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(stream.error(
                    number_offset,
                    format!("Value '{}' must be a positive integer.", number_text),
                ));
            }
        };

        if values.iter().any(|v| v.scope == scope) {
            return Err(stream.error(offset, "Multiple values for the same scope are not allowed."));
        }

        values.push(PaginationValue {
            scope,
            value: number,
            offset: number_offset,
        });

        if stream.is_at_end() {
            break;
        }
        stream.expect(TokenKind::Comma, ", expected.")?;
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::test_graph::graph;

    fn parse(value: &str) -> JsonApiResult<Vec<PaginationValue>> {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");
        parse_pagination(&graph, articles, "page[size]", value)
    }

    #[test]
    fn test_parse_scoped_values() {
        let values = parse("10,tags:5,author.articles:2").expect("should parse");
        assert_eq!(values.len(), 3);
        assert!(values[0].scope.is_none());
        assert_eq!(values[1].scope.as_ref().map(|s| s.to_string()), Some("tags".to_string()));
        assert_eq!(values[2].value, 2);
    }

    #[test]
    fn test_zero_negative_and_text_rejected() {
        for value in ["0", "-1", "ten", "tags:0"] {
            let err = parse(value).expect_err("invalid page value");
            assert!(err.to_string().contains("must be a positive integer"), "{}", value);
        }
    }

    #[test]
    fn test_scope_must_be_to_many() {
        assert!(parse("author:5").is_err());
        assert!(parse("10,20").is_err());
    }
}
