//! Recursive-descent parser for boolean queries.
//!
//! ```text
//! query      := or_expr
//! or_expr    := and_expr ( "or" and_expr )*
//! and_expr   := not_expr ( ["and"] not_expr )*
//! not_expr   := "not" meta_expr | meta_expr
//! meta_expr  := WORD "=" primary | primary
//! primary    := WORD | WORD "*" | "(" or_expr ")"
//! ```
//!
//! Adjacent operands with no operator between them are joined by `and`.

use std::fmt;

use crate::error::{FerretError, Result};
use crate::query::token::{Token, TokenKind, TokenStream};

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// A single lowercase word.
    Word(String),
    /// Every word starting with the given lowercase prefix.
    Prefix(String),
    /// Restrict `node` to occurrences under the named meta name.
    Meta { name: String, node: Box<QueryNode> },
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
    /// Files matching the left side but not the right side.
    AndNot(Box<QueryNode>, Box<QueryNode>),
    /// Every file not matching the operand.
    Not(Box<QueryNode>),
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Word(word) => f.write_str(word),
            QueryNode::Prefix(prefix) => write!(f, "{prefix}*"),
            QueryNode::Meta { name, node } => write!(f, "{name} = {node}"),
            QueryNode::And(a, b) => write!(f, "({a} and {b})"),
            QueryNode::Or(a, b) => write!(f, "({a} or {b})"),
            QueryNode::AndNot(a, b) => write!(f, "({a} and not {b})"),
            QueryNode::Not(a) => write!(f, "(not {a})"),
        }
    }
}

/// Most words and open parentheses accepted in one query. Both parsing and
/// evaluation recurse once per level, so this bounds stack use.
pub const MAX_QUERY_TERMS: usize = 256;

/// Parses query strings into [`QueryNode`] trees.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryParser;

impl QueryParser {
    pub fn new() -> Self {
        QueryParser
    }

    /// Parse a whole query string.
    ///
    /// Any failure (empty query, unbalanced parentheses, an operator where an
    /// operand belongs, tokens left over, more than [`MAX_QUERY_TERMS`] terms)
    /// is a single [`FerretError::MalformedQuery`]; there is no partial result.
    pub fn parse(&self, query: &str) -> Result<QueryNode> {
        let mut parser = Parser {
            tokens: TokenStream::new(query),
            terms: 0,
        };
        if parser.tokens.is_at_end()? {
            return Err(FerretError::malformed_query("empty query"));
        }

        let node = parser.parse_or()?;
        match parser.tokens.next_token()? {
            None => Ok(node),
            Some(token) => Err(FerretError::malformed_query(format!(
                "unexpected '{token}'"
            ))),
        }
    }
}

struct Parser<'a> {
    tokens: TokenStream<'a>,
    terms: usize,
}

impl Parser<'_> {
    fn parse_or(&mut self) -> Result<QueryNode> {
        let mut left = self.parse_and()?;
        loop {
            match self.tokens.next_token()? {
                Some(token) if token.kind == TokenKind::Or => {
                    let right = self.parse_and()?;
                    left = QueryNode::Or(Box::new(left), Box::new(right));
                }
                Some(token) => {
                    self.tokens.put_back(token);
                    return Ok(left);
                }
                None => return Ok(left),
            }
        }
    }

    fn parse_and(&mut self) -> Result<QueryNode> {
        let mut left = self.parse_not()?;
        loop {
            let Some(token) = self.tokens.next_token()? else {
                return Ok(left);
            };
            match token.kind {
                TokenKind::And => {}
                TokenKind::Word | TokenKind::WordStar | TokenKind::LParen | TokenKind::Not => {
                    self.tokens.put_back(token);
                }
                _ => {
                    self.tokens.put_back(token);
                    return Ok(left);
                }
            }

            left = match self.parse_not()? {
                QueryNode::Not(right) => QueryNode::AndNot(Box::new(left), right),
                right => QueryNode::And(Box::new(left), Box::new(right)),
            };
        }
    }

    fn parse_not(&mut self) -> Result<QueryNode> {
        match self.tokens.next_token()? {
            Some(token) if token.kind == TokenKind::Not => {
                Ok(QueryNode::Not(Box::new(self.parse_meta()?)))
            }
            Some(token) => {
                self.tokens.put_back(token);
                self.parse_meta()
            }
            None => Err(unexpected_end()),
        }
    }

    fn parse_meta(&mut self) -> Result<QueryNode> {
        let first = self.tokens.next_token()?.ok_or_else(unexpected_end)?;
        if first.kind == TokenKind::Word {
            match self.tokens.next_token()? {
                Some(second) if second.kind == TokenKind::Equal => {
                    let node = self.parse_primary()?;
                    return Ok(QueryNode::Meta {
                        name: first.lower,
                        node: Box::new(node),
                    });
                }
                Some(second) => self.tokens.put_back(second),
                None => {}
            }
        }
        self.tokens.put_back(first);
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryNode> {
        let token = self.tokens.next_token()?.ok_or_else(unexpected_end)?;
        if matches!(
            token.kind,
            TokenKind::Word | TokenKind::WordStar | TokenKind::LParen
        ) {
            self.terms += 1;
            if self.terms > MAX_QUERY_TERMS {
                return Err(FerretError::malformed_query(format!(
                    "query has more than {MAX_QUERY_TERMS} terms"
                )));
            }
        }
        match token.kind {
            TokenKind::Word => Ok(QueryNode::Word(token.lower)),
            TokenKind::WordStar => Ok(QueryNode::Prefix(token.lower)),
            TokenKind::LParen => {
                let node = self.parse_or()?;
                match self.tokens.next_token()? {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(node),
                    Some(other) => Err(FerretError::malformed_query(format!(
                        "expected ')' but found '{other}'"
                    ))),
                    None => Err(FerretError::malformed_query("missing ')'")),
                }
            }
            _ => Err(FerretError::malformed_query(format!(
                "expected a word but found '{token}'"
            ))),
        }
    }
}

fn unexpected_end() -> FerretError {
    FerretError::malformed_query("query ends where a word was expected")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<QueryNode> {
        QueryParser::new().parse(query)
    }

    fn shown(query: &str) -> String {
        parse(query).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(shown("a or b and c"), "(a or (b and c))");
        assert_eq!(shown("a and b or c"), "((a and b) or c)");
        assert_eq!(shown("(a or b) and c"), "((a or b) and c)");
    }

    #[test]
    fn test_and_not() {
        assert_eq!(shown("cat and not dog"), "(cat and not dog)");
        assert_eq!(shown("cat not dog"), "(cat and not dog)");
        assert_eq!(shown("not dog"), "(not dog)");
        assert_eq!(shown("cat or not dog"), "(cat or (not dog))");
    }

    #[test]
    fn test_implicit_and() {
        assert_eq!(shown("cat dog"), "(cat and dog)");
        assert_eq!(shown("cat (dog or bird)"), "(cat and (dog or bird))");
    }

    #[test]
    fn test_prefix_and_case() {
        assert_eq!(parse("Comp*").unwrap(), QueryNode::Prefix("comp".into()));
        assert_eq!(parse("CAT").unwrap(), QueryNode::Word("cat".into()));
    }

    #[test]
    fn test_meta_restriction() {
        assert_eq!(shown("title = cat"), "title = cat");
        assert_eq!(shown("title=(cat or dog)"), "title = (cat or dog)");
        assert_eq!(shown("not author = smith"), "(not author = smith)");
        assert_eq!(shown("cat title = dog"), "(cat and title = dog)");
    }

    #[test]
    fn test_malformed_queries() {
        for query in [
            "", "   ", "(cat", "cat)", "and cat", "cat and", "cat or", "()", "not", "= cat",
            "cat = ", "(cat or)", "title = = cat",
        ] {
            assert!(
                matches!(parse(query), Err(FerretError::MalformedQuery(_))),
                "{query:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_term_limit() {
        let nested = format!("{}cat{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(parse(&nested), Err(FerretError::MalformedQuery(_))));

        let chain = vec!["cat"; 5_000].join(" or ");
        assert!(matches!(parse(&chain), Err(FerretError::MalformedQuery(_))));

        let at_limit = vec!["cat"; MAX_QUERY_TERMS].join(" ");
        assert!(parse(&at_limit).is_ok());
        let over_limit = vec!["cat"; MAX_QUERY_TERMS + 1].join(" ");
        assert!(matches!(parse(&over_limit), Err(FerretError::MalformedQuery(_))));

        let moderate = format!("{}cat{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&moderate).unwrap(), QueryNode::Word("cat".into()));
    }
}
