//! Parser for `sort` and `sort[<scope>]` values

use super::{AttrUse, ChainPattern, TokenStream};
use crate::core::error::JsonApiResult;
use crate::graph::{ResourceGraph, ResourceType};
use crate::query::expression::{SortElement, SortExpression, SortTarget};
use crate::query::tokenizer::{Token, TokenKind};

pub fn parse_sort(
    graph: &ResourceGraph,
    resource_type: &ResourceType,
    parameter: &str,
    value: &str,
) -> JsonApiResult<SortExpression> {
    let mut stream = TokenStream::new(parameter, value)?;
    let mut elements = Vec::new();

    loop {
        let (text, offset) = stream.expect_text("Sort field expected.")?;
        let (ascending, name, name_offset) = match text.strip_prefix('-') {
            Some(rest) => (false, rest.to_string(), offset + 1),
            None => (true, text, offset),
        };

        let target = if name == "count"
            && matches!(stream.peek(), Some(Token { kind: TokenKind::OpenParen, .. }))
        {
            stream.next_token();
            let (path, path_offset) = stream.expect_text("To-many relationship expected.")?;
            let chain = stream.resolve_chain(
                graph,
                resource_type,
                &path,
                path_offset,
                ChainPattern::ToOneThenToMany,
                None,
            )?;
            stream.expect(TokenKind::CloseParen, ") expected.")?;
            SortTarget::Count(chain)
        } else {
            if name.is_empty() {
                return Err(stream.error(name_offset, "Sort field expected."));
            }
            SortTarget::Field(stream.resolve_chain(
                graph,
                resource_type,
                &name,
                name_offset,
                ChainPattern::ToOneThenAttribute,
                Some(AttrUse::Sort),
            )?)
        };

        elements.push(SortElement { target, ascending });

        if stream.is_at_end() {
            break;
        }
        stream.expect(TokenKind::Comma, ", expected.")?;
    }

    Ok(SortExpression { elements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::test_graph::graph;

    fn parse(value: &str) -> JsonApiResult<SortExpression> {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");
        parse_sort(&graph, articles, "sort", value)
    }

    #[test]
    fn test_parse_sort_elements() {
        let sort = parse("-wordCount,author.name,-count(tags)").expect("should parse");
        assert_eq!(sort.elements.len(), 3);
        assert!(!sort.elements[0].ascending);
        assert!(sort.elements[1].ascending);
        assert!(matches!(sort.elements[2].target, SortTarget::Count(_)));
        assert_eq!(sort.to_string(), "-wordCount,author.name,-count(tags)");
    }

    #[test]
    fn test_sort_capability_enforced() {
        let err = parse("body").expect_err("body is not sortable");
        assert!(err.to_string().contains("Sorting on attribute 'body' is not allowed."));
    }

    #[test]
    fn test_sort_errors() {
        assert!(parse("caption,").is_err());
        assert!(parse("-").is_err());
        let err = parse("-missing").expect_err("unknown attribute");
        assert!(err.to_string().contains("Failed at position 2"));
        assert!(parse("count(author)").is_err());
    }
}
