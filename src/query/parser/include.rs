//! Parser for `include` values

use super::{ChainPattern, TokenStream};
use crate::core::error::{JsonApiResult, ValidationError};
use crate::graph::{ResourceGraph, ResourceType};
use crate::query::expression::IncludeExpression;
use crate::query::tokenizer::TokenKind;

pub fn parse_include(
    graph: &ResourceGraph,
    resource_type: &ResourceType,
    parameter: &str,
    value: &str,
    maximum_depth: Option<usize>,
) -> JsonApiResult<IncludeExpression> {
    let mut stream = TokenStream::new(parameter, value)?;
    let mut include = IncludeExpression::default();

    loop {
        let (path, offset) = stream.expect_text("Relationship name expected.")?;
        let chain = stream.resolve_chain(
            graph,
            resource_type,
            &path,
            offset,
            ChainPattern::Relationships,
            None,
        )?;

        let mut segment_offset = offset;
        let mut owner = resource_type.public_name.as_str();
        for relationship in &chain.relationships {
            if !relationship.can_include {
                return Err(stream.error(
                    segment_offset,
                    format!(
                        "Including the relationship '{}' on '{}' is not allowed.",
                        relationship.public_name, owner
                    ),
                ));
            }
            segment_offset += relationship.public_name.chars().count() + 1;
            owner = relationship.right_type.as_str();
        }

        if let Some(maximum) = maximum_depth {
            if chain.relationships.len() > maximum {
                return Err(ValidationError::IncludeDepthExceeded {
                    parameter: parameter.to_string(),
                    chain: path,
                    maximum,
                }
                .into());
            }
        }

        include.add_chain(&chain.relationships);

        if stream.is_at_end() {
            break;
        }
        stream.expect(TokenKind::Comma, ", expected.")?;
    }

    Ok(include)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::JsonApiError;
    use crate::query::parser::test_graph::graph;

    fn parse(value: &str, maximum_depth: Option<usize>) -> JsonApiResult<IncludeExpression> {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");
        parse_include(&graph, articles, "include", value, maximum_depth)
    }

    #[test]
    fn test_parse_include_tree() {
        let include = parse("author.articles.tags,tags,author", None).expect("should parse");
        assert_eq!(include.to_string(), "author.articles.tags,tags");
    }

    #[test]
    fn test_depth_exceeded_is_dedicated_error() {
        let err = parse("author.articles.tags", Some(2)).expect_err("too deep");
        match err {
            JsonApiError::Validation(ValidationError::IncludeDepthExceeded {
                chain, maximum, ..
            }) => {
                assert_eq!(chain, "author.articles.tags");
                assert_eq!(maximum, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(parse("author.articles", Some(2)).is_ok());
    }

    #[test]
    fn test_non_includable_relationship_rejected() {
        let err = parse("tags,revisions", None).expect_err("revisions cannot be included");
        let message = err.to_string();
        assert!(
            message.contains("Including the relationship 'revisions' on 'articles' is not allowed.")
        );
        assert!(message.contains("Failed at position 6"));
    }

    #[test]
    fn test_unknown_relationship_rejected() {
        assert!(parse("caption", None).is_err());
        assert!(parse("author.", None).is_err());
    }
}
