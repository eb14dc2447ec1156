//! Lexer for the CelestaSQL expression subset.
//!
//! Converts expression text into a token stream. Keywords are matched
//! case-insensitively; text literals keep their quotes (and doubled-quote
//! escapes) so that printing a parsed tree reproduces the input exactly.

use celesta_error::{CelestaError, CelestaResult};

/// A lexical token kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// Numeric literal, kept as its lexical text.
    Number(String),
    /// Text literal, quotes included.
    Text(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    /// `||`
    Concat,
    Eq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    /// `<>`
    NtEq,
    And,
    Or,
    Not,
    In,
    Between,
    Is,
    Null,
    Like,
    Eof,
}

/// A token with its byte offset into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

fn lookup_keyword(word: &str) -> Option<TokenKind> {
    match word.to_ascii_uppercase().as_str() {
        "AND" => Some(TokenKind::And),
        "OR" => Some(TokenKind::Or),
        "NOT" => Some(TokenKind::Not),
        "IN" => Some(TokenKind::In),
        "BETWEEN" => Some(TokenKind::Between),
        "IS" => Some(TokenKind::Is),
        "NULL" => Some(TokenKind::Null),
        "LIKE" => Some(TokenKind::Like),
        _ => None,
    }
}

/// Tokenize an expression, appending a final `Eof` token.
pub fn tokenize(source: &str) -> CelestaResult<Vec<Token>> {
    let src = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < src.len() {
        let start = pos;
        let ch = src[pos];
        match ch {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b'(' => {
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    pos: start,
                });
                pos += 1;
            }
            b')' => {
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    pos: start,
                });
                pos += 1;
            }
            b',' => {
                tokens.push(Token {
                    kind: TokenKind::Comma,
                    pos: start,
                });
                pos += 1;
            }
            b'.' => {
                tokens.push(Token {
                    kind: TokenKind::Dot,
                    pos: start,
                });
                pos += 1;
            }
            b'+' => {
                tokens.push(Token {
                    kind: TokenKind::Plus,
                    pos: start,
                });
                pos += 1;
            }
            b'-' => {
                tokens.push(Token {
                    kind: TokenKind::Minus,
                    pos: start,
                });
                pos += 1;
            }
            b'*' => {
                tokens.push(Token {
                    kind: TokenKind::Star,
                    pos: start,
                });
                pos += 1;
            }
            b'/' => {
                tokens.push(Token {
                    kind: TokenKind::Slash,
                    pos: start,
                });
                pos += 1;
            }
            b'|' => {
                if src.get(pos + 1) == Some(&b'|') {
                    tokens.push(Token {
                        kind: TokenKind::Concat,
                        pos: start,
                    });
                    pos += 2;
                } else {
                    return Err(CelestaError::parse(format!(
                        "unexpected character '|' at offset {start}"
                    )));
                }
            }
            b'=' => {
                tokens.push(Token {
                    kind: TokenKind::Eq,
                    pos: start,
                });
                pos += 1;
            }
            b'<' => match src.get(pos + 1) {
                Some(b'=') => {
                    tokens.push(Token {
                        kind: TokenKind::LtEq,
                        pos: start,
                    });
                    pos += 2;
                }
                Some(b'>') => {
                    tokens.push(Token {
                        kind: TokenKind::NtEq,
                        pos: start,
                    });
                    pos += 2;
                }
                _ => {
                    tokens.push(Token {
                        kind: TokenKind::Lt,
                        pos: start,
                    });
                    pos += 1;
                }
            },
            b'>' => {
                if src.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::GtEq,
                        pos: start,
                    });
                    pos += 2;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Gt,
                        pos: start,
                    });
                    pos += 1;
                }
            }
            b'\'' => {
                pos += 1;
                loop {
                    match src.get(pos) {
                        None => {
                            return Err(CelestaError::parse(format!(
                                "unterminated text literal at offset {start}"
                            )));
                        }
                        Some(b'\'') => {
                            // A doubled quote is an escape, not a terminator.
                            if src.get(pos + 1) == Some(&b'\'') {
                                pos += 2;
                            } else {
                                pos += 1;
                                break;
                            }
                        }
                        Some(_) => pos += 1,
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Text(source[start..pos].to_owned()),
                    pos: start,
                });
            }
            b'0'..=b'9' => {
                while pos < src.len() && src[pos].is_ascii_digit() {
                    pos += 1;
                }
                if pos < src.len() && src[pos] == b'.' && src.get(pos + 1).is_some_and(u8::is_ascii_digit)
                {
                    pos += 1;
                    while pos < src.len() && src[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Number(source[start..pos].to_owned()),
                    pos: start,
                });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < src.len()
                    && (src[pos].is_ascii_alphanumeric() || src[pos] == b'_')
                {
                    pos += 1;
                }
                let word = &source[start..pos];
                let kind =
                    lookup_keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_owned()));
                tokens.push(Token { kind, pos: start });
            }
            other => {
                return Err(CelestaError::parse(format!(
                    "unexpected character '{}' at offset {start}",
                    other as char
                )));
            }
        }
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: src.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a >= 1 <> 2 || b"),
            vec![
                TokenKind::Ident("a".to_owned()),
                TokenKind::GtEq,
                TokenKind::Number("1".to_owned()),
                TokenKind::NtEq,
                TokenKind::Number("2".to_owned()),
                TokenKind::Concat,
                TokenKind::Ident("b".to_owned()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("not a In b BETWEEN"),
            vec![
                TokenKind::Not,
                TokenKind::Ident("a".to_owned()),
                TokenKind::In,
                TokenKind::Ident("b".to_owned()),
                TokenKind::Between,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_text_literal_keeps_quotes_and_escapes() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::Text("'it''s'".to_owned()), TokenKind::Eof]
        );
        assert!(tokenize("'oops").is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1.25 7"),
            vec![
                TokenKind::Number("1.25".to_owned()),
                TokenKind::Number("7".to_owned()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_illegal_character() {
        assert!(tokenize("a ? b").is_err());
        assert!(tokenize("a | b").is_err());
    }
}
