//! Tokenizer shared by all query string parameter grammars

use crate::core::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    Comma,
    Colon,
    /// Text between single quotes, with `''` unescaped to `'`
    QuotedText(String),
    Text(String),
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::OpenParen => "(".to_string(),
            TokenKind::CloseParen => ")".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::QuotedText(text) => format!("'{}'", text.replace('\'', "''")),
            TokenKind::Text(text) => text.clone(),
        }
    }
}

/// A token and the zero-based character offset where it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Split a parameter value into tokens
pub fn tokenize(parameter: &str, value: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = value.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        let single = match ch {
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            _ => None,
        };

        if let Some(kind) = single {
            tokens.push(Token { kind, offset: index });
            index += 1;
        } else if ch == '\'' {
            let start = index;
            let mut text = String::new();
            index += 1;
            loop {
                match chars.get(index) {
                    None => {
                        return Err(ParseError::query_string(
                            parameter,
                            value,
                            index,
                            "' expected.",
                        ));
                    }
                    Some('\'') if chars.get(index + 1) == Some(&'\'') => {
                        text.push('\'');
                        index += 2;
                    }
                    Some('\'') => {
                        index += 1;
                        break;
                    }
                    Some(other) => {
                        text.push(*other);
                        index += 1;
                    }
                }
            }
            tokens.push(Token {
                kind: TokenKind::QuotedText(text),
                offset: start,
            });
        } else if ch.is_whitespace() {
            index += 1;
        } else {
            let start = index;
            let mut text = String::new();
            while let Some(&c) = chars.get(index) {
                if matches!(c, '(' | ')' | ',' | ':' | '\'') || c.is_whitespace() {
                    break;
                }
                text.push(c);
                index += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Text(text),
                offset: start,
            });
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(value: &str) -> Vec<TokenKind> {
        tokenize("filter", value)
            .expect("should tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds("equals(caption,'X')"),
            vec![
                TokenKind::Text("equals".into()),
                TokenKind::OpenParen,
                TokenKind::Text("caption".into()),
                TokenKind::Comma,
                TokenKind::QuotedText("X".into()),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn test_doubled_quote_escapes() {
        assert_eq!(kinds("'it''s'"), vec![TokenKind::QuotedText("it's".into())]);
        assert_eq!(kinds("''"), vec![TokenKind::QuotedText(String::new())]);
    }

    #[test]
    fn test_offsets_are_character_positions() {
        let tokens = tokenize("page[size]", "10,tags:5").expect("should tokenize");
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 2, 3, 7, 8]);
    }

    #[test]
    fn test_unterminated_quote_fails() {
        let err = tokenize("filter", "equals(caption,'X").expect_err("should fail");
        assert!(err.to_string().contains("' expected."));
    }
}
