//! Lexical analysis for property expressions.

use crate::error::{CoreObjectsError, CoreResult};

/// Tokens of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer literal
    Integer(i64),
    /// Floating-point literal
    Number(f64),
    /// Quoted string literal
    String(String),
    /// Bare identifier (function name, `value`, `True`, `False`)
    Identifier(String),
    /// `$Path[:Suffix]` sibling value reference
    Dollar { path: String, suffix: Option<String> },
    /// `%Name[:Suffix]` property reference
    PercentRef { name: String, suffix: Option<String> },

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,

    Plus,
    Minus,
    Star,
    Slash,
    Not,

    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    LogicalAnd,
    LogicalOr,

    Eof,
}

/// A token with the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split an expression into tokens, terminated by [`Token::Eof`].
pub fn tokenize(input: &str) -> CoreResult<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let error = |position: usize, message: &str| {
        CoreObjectsError::ParseFailed(format!(
            "{} at position {} in '{}'",
            message, position, input
        ))
    };

    while i < chars.len() {
        let (position, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let peek = chars.get(i + 1).map(|(_, c)| *c);
        let single = |token: Token| Spanned { token, position };

        match c {
            '(' => tokens.push(single(Token::LeftParen)),
            ')' => tokens.push(single(Token::RightParen)),
            '[' => tokens.push(single(Token::LeftBracket)),
            ']' => tokens.push(single(Token::RightBracket)),
            ',' => tokens.push(single(Token::Comma)),
            '+' => tokens.push(single(Token::Plus)),
            '-' => tokens.push(single(Token::Minus)),
            '*' => tokens.push(single(Token::Star)),
            '/' => tokens.push(single(Token::Slash)),
            '=' if peek == Some('=') => {
                tokens.push(single(Token::Equal));
                i += 1;
            }
            '!' if peek == Some('=') => {
                tokens.push(single(Token::NotEqual));
                i += 1;
            }
            '!' => tokens.push(single(Token::Not)),
            '<' if peek == Some('=') => {
                tokens.push(single(Token::LessEq));
                i += 1;
            }
            '<' => tokens.push(single(Token::Less)),
            '>' if peek == Some('=') => {
                tokens.push(single(Token::GreaterEq));
                i += 1;
            }
            '>' => tokens.push(single(Token::Greater)),
            '&' if peek == Some('&') => {
                tokens.push(single(Token::LogicalAnd));
                i += 1;
            }
            '|' if peek == Some('|') => {
                tokens.push(single(Token::LogicalOr));
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some((_, ch)) if *ch == quote => break,
                        Some((_, '\\')) => {
                            if let Some((_, escaped)) = chars.get(i + 1) {
                                text.push(*escaped);
                                i += 2;
                            } else {
                                return Err(error(position, "unterminated string"));
                            }
                        }
                        Some((_, ch)) => {
                            text.push(*ch);
                            i += 1;
                        }
                        None => return Err(error(position, "unterminated string")),
                    }
                }
                tokens.push(single(Token::String(text)));
            }
            '$' | '%' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (is_name_char(chars[end].1) || chars[end].1 == '.') {
                    end += 1;
                }
                if end == start {
                    return Err(error(position, "expected property name"));
                }
                let name: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
                    return Err(error(position, "malformed property path"));
                }

                let mut suffix = None;
                if chars.get(end).map(|(_, c)| *c) == Some(':') {
                    let s_start = end + 1;
                    let mut s_end = s_start;
                    while s_end < chars.len() && is_name_char(chars[s_end].1) {
                        s_end += 1;
                    }
                    if s_end == s_start {
                        return Err(error(position, "expected reference suffix after ':'"));
                    }
                    suffix = Some(chars[s_start..s_end].iter().map(|(_, c)| *c).collect());
                    end = s_end;
                }

                let token = if c == '$' {
                    Token::Dollar { path: name, suffix }
                } else {
                    if name.contains('.') {
                        return Err(error(position, "property references cannot be paths"));
                    }
                    Token::PercentRef { name, suffix }
                };
                tokens.push(single(token));
                i = end;
                continue;
            }
            c if c.is_ascii_digit() || (c == '.' && peek.is_some_and(|p| p.is_ascii_digit())) => {
                let start = i;
                let mut end = i;
                let mut is_float = false;
                while end < chars.len() {
                    let ch = chars[end].1;
                    if ch.is_ascii_digit() {
                        end += 1;
                    } else if ch == '.' && !is_float {
                        is_float = true;
                        end += 1;
                    } else if (ch == 'e' || ch == 'E') && end > start {
                        is_float = true;
                        end += 1;
                        if matches!(chars.get(end).map(|(_, c)| *c), Some('+') | Some('-')) {
                            end += 1;
                        }
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                let token = if is_float {
                    Token::Number(
                        text.parse::<f64>()
                            .map_err(|_| error(position, "invalid number"))?,
                    )
                } else {
                    Token::Integer(
                        text.parse::<i64>()
                            .map_err(|_| error(position, "integer literal out of range"))?,
                    )
                };
                tokens.push(single(token));
                i = end;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                let mut end = i;
                while end < chars.len() && is_name_char(chars[end].1) {
                    end += 1;
                }
                let text: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                tokens.push(single(Token::Identifier(text)));
                i = end;
                continue;
            }
            _ => return Err(error(position, &format!("unexpected character '{}'", c))),
        }
        i += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        position: input.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_arithmetic_with_reference() {
        assert_eq!(
            kinds("$MinProperty - 3"),
            vec![
                Token::Dollar {
                    path: "MinProperty".into(),
                    suffix: None
                },
                Token::Minus,
                Token::Integer(3),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_suffix_and_path() {
        assert_eq!(
            kinds("$Child.Mode:SelectedValue == 'b'"),
            vec![
                Token::Dollar {
                    path: "Child.Mode".into(),
                    suffix: Some("SelectedValue".into())
                },
                Token::Equal,
                Token::String("b".into()),
                Token::Eof,
            ]
        );
        assert_eq!(
            kinds("%Target:Value"),
            vec![
                Token::PercentRef {
                    name: "Target".into(),
                    suffix: Some("Value".into())
                },
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("a<=b && !c || d!=e"),
            vec![
                Token::Identifier("a".into()),
                Token::LessEq,
                Token::Identifier("b".into()),
                Token::LogicalAnd,
                Token::Not,
                Token::Identifier("c".into()),
                Token::LogicalOr,
                Token::Identifier("d".into()),
                Token::NotEqual,
                Token::Identifier("e".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            kinds("1.5 2 3e2"),
            vec![
                Token::Number(1.5),
                Token::Integer(2),
                Token::Number(300.0),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("$").is_err());
        assert!(tokenize("%A.B").is_err());
        assert!(tokenize("1 # 2").is_err());
        assert!(tokenize("a = b").is_err());
    }
}
