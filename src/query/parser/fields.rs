//! Parser for `fields[<type>]` values

use indexmap::IndexSet;

use super::TokenStream;
use crate::core::error::JsonApiResult;
use crate::graph::{ResourceField, ResourceType};
use crate::query::tokenizer::TokenKind;

/// Parse a sparse fieldset; an empty value selects no fields at all
pub fn parse_fieldset(
    resource_type: &ResourceType,
    parameter: &str,
    value: &str,
) -> JsonApiResult<IndexSet<String>> {
    let mut stream = TokenStream::new(parameter, value)?;
    let mut fields = IndexSet::new();

    if stream.is_at_end() {
        return Ok(fields);
    }

    loop {
        let (name, offset) = stream.expect_text("Field name expected.")?;
        match resource_type.field(&name) {
            Some(ResourceField::Attribute(attribute)) if !attribute.capabilities.view => {
                return Err(stream.error(
                    offset,
                    format!("Retrieving the attribute '{}' is not allowed.", name),
                ));
            }
            Some(_) => {
                fields.insert(name);
            }
            None => {
                return Err(stream.error(
                    offset,
                    format!(
                        "Field '{}' does not exist on resource type '{}'.",
                        name, resource_type.public_name
                    ),
                ));
            }
        }

        if stream.is_at_end() {
            break;
        }
        stream.expect(TokenKind::Comma, ", expected.")?;
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::test_graph::graph;

    #[test]
    fn test_parse_fieldset() {
        let graph = graph();
        let articles = graph.resource_type("articles").expect("registered");

        let parameter = "fields[articles]";

        let fields = parse_fieldset(articles, parameter, "caption,author").expect("should parse");
        assert_eq!(fields.into_iter().collect::<Vec<_>>(), vec!["caption", "author"]);

        assert!(parse_fieldset(articles, parameter, "").expect("empty allowed").is_empty());

        let err = parse_fieldset(articles, parameter, "caption,name").expect_err("unknown field");
        let message = err.to_string();
        assert!(message.contains("Field 'name' does not exist on resource type 'articles'."));
    }
}
