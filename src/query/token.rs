//! Tokenizer for the query language.

use std::fmt;

use crate::error::{FerretError, Result};

/// Kinds of query tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    And,
    Or,
    Not,
    LParen,
    RParen,
    /// `=` between a meta name and what it restricts.
    Equal,
    Word,
    /// A word immediately followed by `*`.
    WordStar,
}

/// A token with its surface form and its lowercase form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The text as it appeared in the query, for diagnostics.
    pub text: String,
    /// The text lowercased, for comparison against the index.
    pub lower: String,
}

impl Token {
    fn new(kind: TokenKind, text: &str) -> Self {
        Token {
            kind,
            text: text.to_string(),
            lower: text.to_lowercase(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::WordStar => write!(f, "{}*", self.text),
            _ => f.write_str(&self.text),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '=' | '*')
}

/// A stream of tokens that can take back already-parsed tokens as lookahead.
///
/// Tokens are put back whole, so they are never scanned twice. The query
/// grammar needs at most two tokens of lookahead, but the put-back stack is
/// not bounded.
#[derive(Debug)]
pub struct TokenStream<'a> {
    input: &'a str,
    pos: usize,
    put_back: Vec<Token>,
}

impl<'a> TokenStream<'a> {
    pub fn new(input: &'a str) -> Self {
        TokenStream {
            input,
            pos: 0,
            put_back: Vec::new(),
        }
    }

    /// Return a token to the stream; the last one put back is read first.
    pub fn put_back(&mut self, token: Token) {
        self.put_back.push(token);
    }

    /// Whether every token has been consumed.
    pub fn is_at_end(&mut self) -> Result<bool> {
        match self.next_token()? {
            Some(token) => {
                self.put_back(token);
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Read the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.put_back.pop() {
            return Ok(Some(token));
        }

        loop {
            let rest = &self.input[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            let Some(c) = trimmed.chars().next() else {
                return Ok(None);
            };
            match c {
                '(' | ')' | '=' => {
                    self.pos += 1;
                    let kind = match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        _ => TokenKind::Equal,
                    };
                    return Ok(Some(Token::new(kind, &trimmed[..1])));
                }
                '*' => {
                    return Err(FerretError::malformed_query(
                        "'*' must directly follow a word",
                    ));
                }
                _ => {}
            }

            let len = trimmed.find(is_delimiter).unwrap_or(trimmed.len());
            let raw = &trimmed[..len];
            self.pos += len;
            let starred = trimmed[len..].starts_with('*');
            if starred {
                self.pos += 1;
            }

            // Punctuation hanging off either end is not part of the word.
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() {
                if starred {
                    return Err(FerretError::malformed_query(format!(
                        "'{raw}*' has no word before '*'"
                    )));
                }
                continue;
            }

            if starred {
                return Ok(Some(Token::new(TokenKind::WordStar, word)));
            }
            let kind = match word.to_lowercase().as_str() {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                _ => TokenKind::Word,
            };
            return Ok(Some(Token::new(kind, word)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut stream = TokenStream::new(input);
        let mut kinds = Vec::new();
        while let Some(token) = stream.next_token().unwrap() {
            kinds.push(token.kind);
        }
        kinds
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("cat AND dog Or NOT bird"),
            vec![
                TokenKind::Word,
                TokenKind::And,
                TokenKind::Word,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Word
            ]
        );
    }

    #[test]
    fn test_parens_star_and_equal() {
        assert_eq!(
            kinds("(title=comp* or dog)"),
            vec![
                TokenKind::LParen,
                TokenKind::Word,
                TokenKind::Equal,
                TokenKind::WordStar,
                TokenKind::Or,
                TokenKind::Word,
                TokenKind::RParen
            ]
        );
    }

    #[test]
    fn test_surface_form_is_preserved() {
        let mut stream = TokenStream::new("  Cats, ");
        let token = stream.next_token().unwrap().unwrap();
        assert_eq!(token.text, "Cats");
        assert_eq!(token.lower, "cats");
        assert!(stream.next_token().unwrap().is_none());
    }

    #[test]
    fn test_starred_keyword_is_a_word() {
        let mut stream = TokenStream::new("and*");
        let token = stream.next_token().unwrap().unwrap();
        assert_eq!(token.kind, TokenKind::WordStar);
        assert_eq!(token.to_string(), "and*");
    }

    #[test]
    fn test_put_back_is_lifo() {
        let mut stream = TokenStream::new("a b c");
        let a = stream.next_token().unwrap().unwrap();
        let b = stream.next_token().unwrap().unwrap();
        stream.put_back(b);
        stream.put_back(a);
        assert_eq!(stream.next_token().unwrap().unwrap().text, "a");
        assert_eq!(stream.next_token().unwrap().unwrap().text, "b");
        assert_eq!(stream.next_token().unwrap().unwrap().text, "c");
        assert!(stream.is_at_end().unwrap());
    }

    #[test]
    fn test_lone_star_is_malformed() {
        let mut stream = TokenStream::new("*");
        assert!(matches!(
            stream.next_token(),
            Err(FerretError::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_punctuation_only_is_skipped() {
        assert_eq!(kinds("-- cat ..."), vec![TokenKind::Word]);
    }
}
