//! Claim and check condition language
//!
//! Single-pass tokenizer plus a small recursive descent parser:
//!
//! ```text
//! claim := claim_term ('and' claim_term)*
//! claim_term := 'is' ['not'] TAG | 'derives' 'from' CONNECTION
//! check := term (('and' | 'or') term)*
//! term := '(' check ')'
//!       | 'is' ['not'] TAG
//!       | 'is' ['not'] ('node' | 'edge') ID
//!       | 'is' ['not'] 'from' 'handle' CONNECTION
//!       | 'is' ['not'] 'from' 'output' CONNECTION
//!       | 'is' ['not'] 'from' 'store' (NAME | 'QUOTED ID')
//! ```
//!
//! Mixing `and` and `or` at one nesting level is rejected; parenthesize.
//! `node` and `edge` only start an id condition when a name follows, so
//! `is node` alone still checks the tag `node`.

use crate::error::FlowError;
use crate::graph::{Check, Claim, Condition, StoreRef};

const KEYWORDS: &[&str] = &["is", "not", "from", "handle", "store", "and", "or", "derives"];

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Quoted(&'a str),
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    And,
    Or,
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token<'_>)>, FlowError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(i, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((i, Token::Open));
            }
            ')' => {
                chars.next();
                tokens.push((i, Token::Close));
            }
            '\'' | '"' => {
                chars.next();
                let start = i + 1;
                let end = loop {
                    match chars.next() {
                        Some((j, c)) if c == ch => break j,
                        Some(_) => continue,
                        None => {
                            return Err(parse_error(text, i, "unterminated quoted string"));
                        }
                    }
                };
                if end == start {
                    return Err(parse_error(text, i, "empty quoted string"));
                }
                tokens.push((i, Token::Quoted(&text[start..end])));
            }
            c if is_word_char(c) => {
                let mut end = i;
                while let Some(&(j, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    end = j + c.len_utf8();
                    chars.next();
                }
                tokens.push((i, Token::Word(&text[i..end])));
            }
            other => {
                return Err(parse_error(text, i, &format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn parse_error(text: &str, position: usize, details: &str) -> FlowError {
    FlowError::ConditionParse {
        text: text.to_string(),
        position,
        details: details.to_string(),
    }
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, FlowError> {
        Ok(Self {
            text,
            tokens: tokenize(text)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.text.len(), |(i, _)| *i)
    }

    fn error(&self, details: &str) -> FlowError {
        parse_error(self.text, self.position(), details)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if *w == keyword)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), FlowError> {
        if self.at_keyword(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{keyword}'")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.at_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    /// A bare word that is not a keyword.
    fn expect_name(&mut self, what: &str) -> Result<String, FlowError> {
        match self.peek() {
            Some(Token::Word(w)) if !KEYWORDS.contains(w) => {
                let name = w.to_string();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(&format!("expected {what}"))),
        }
    }

    /// Whether the token after the current one is a non-keyword word.
    fn name_follows(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1),
            Some((_, Token::Word(w))) if !KEYWORDS.contains(w)
        )
    }

    fn expect_end(&self) -> Result<(), FlowError> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("unexpected trailing input")),
        }
    }

    fn parse_check(&mut self) -> Result<Check, FlowError> {
        let mut children = vec![self.parse_term()?];
        let mut operator: Option<Operator> = None;

        loop {
            let this = if self.at_keyword("and") {
                Operator::And
            } else if self.at_keyword("or") {
                Operator::Or
            } else {
                break;
            };
            if operator.is_some_and(|op| op != this) {
                return Err(self.error("cannot mix 'and' and 'or' without parentheses"));
            }
            operator = Some(this);
            self.pos += 1;
            children.push(self.parse_term()?);
        }

        Ok(match operator {
            None => children.remove(0),
            Some(Operator::And) => Check::And(children),
            Some(Operator::Or) => Check::Or(children),
        })
    }

    fn parse_term(&mut self) -> Result<Check, FlowError> {
        if self.peek() == Some(&Token::Open) {
            self.pos += 1;
            let inner = self.parse_check()?;
            return match self.peek() {
                Some(Token::Close) => {
                    self.pos += 1;
                    Ok(inner)
                }
                _ => Err(self.error("expected ')'")),
            };
        }

        self.expect_keyword("is")?;
        let negated = self.eat_keyword("not");

        let condition = if self.eat_keyword("from") {
            if self.eat_keyword("handle") {
                Condition::FromHandle {
                    connection: self.expect_name("connection name")?,
                    node_id: None,
                }
            } else if self.eat_keyword("output") {
                Condition::FromOutput {
                    connection: self.expect_name("connection name")?,
                    edge_id: None,
                }
            } else if self.eat_keyword("store") {
                let store = match self.peek() {
                    Some(Token::Quoted(id)) => {
                        let id = id.to_string();
                        self.pos += 1;
                        StoreRef::Id(id)
                    }
                    _ => StoreRef::Name(self.expect_name("store name or quoted store id")?),
                };
                Condition::FromStore { store, node_id: None }
            } else {
                return Err(self.error("expected 'handle', 'output' or 'store'"));
            }
        } else if (self.at_keyword("node") || self.at_keyword("edge")) && self.name_follows() {
            let node = self.at_keyword("node");
            self.pos += 1;
            let id = self.expect_name("id")?;
            if node {
                Condition::Node(id)
            } else {
                Condition::Edge(id)
            }
        } else {
            Condition::Tag(self.expect_name("tag")?)
        };

        Ok(Check::Leaf { condition, negated })
    }

    fn parse_claims(&mut self) -> Result<Vec<Claim>, FlowError> {
        let mut claims = Vec::new();
        loop {
            if self.eat_keyword("derives") {
                self.expect_keyword("from")?;
                claims.push(Claim::DerivesFrom {
                    connection: self.expect_name("connection name")?,
                });
            } else {
                self.expect_keyword("is")?;
                let is_not = self.eat_keyword("not");
                claims.push(Claim::IsTag {
                    is_not,
                    tag: self.expect_name("tag")?,
                });
            }
            if !self.eat_keyword("and") {
                break;
            }
        }
        Ok(claims)
    }
}

/// Parses check text such as `is trusted or is from handle input1`.
pub fn parse_check(text: &str) -> Result<Check, FlowError> {
    let mut parser = Parser::new(text)?;
    if parser.peek().is_none() {
        return Err(parser.error("empty check"));
    }
    let check = parser.parse_check()?;
    parser.expect_end()?;
    Ok(check)
}

/// Parses claim text such as `is trusted and is not private`.
pub fn parse_claims(text: &str) -> Result<Vec<Claim>, FlowError> {
    let mut parser = Parser::new(text)?;
    if parser.peek().is_none() {
        return Err(parser.error("empty claim"));
    }
    let claims = parser.parse_claims()?;
    parser.expect_end()?;
    Ok(claims)
}
