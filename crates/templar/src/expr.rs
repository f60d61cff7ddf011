//! Expression parsing.
//!
//! Templates evaluate a closed access grammar over the render scope:
//! names, attribute access, string/integer indexing. Call syntax is
//! parsed only so that invoking anything (deny-listed builtin or not)
//! fails with a precise render error instead of a generic one.

use crate::error::{RenderError, RenderResult};

/// Call names that are rejected with the dedicated "disabled builtin"
/// error. Everything else callable is an unknown function.
pub const DISABLED_BUILTINS: &[&str] = &[
    "exec",
    "eval",
    "compile",
    "setattr",
    "delattr",
    "getattr",
    "globals",
    "locals",
    "vars",
    "open",
    "__import__",
];

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bare name (scope root or, in argument position, an identifier).
    Name(String),
    /// A quoted string literal.
    Str(String),
    /// An integer literal.
    Int(i64),
    /// `receiver.attr`
    Attr(Box<Expr>, String),
    /// `receiver[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `callee(args...)`, always rejected at evaluation time.
    Call(Box<Expr>, Vec<Expr>),
}

impl Expr {
    /// The leftmost name in an access chain, when there is one.
    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Attr(recv, _) | Self::Index(recv, _) | Self::Call(recv, _) => recv.root_name(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Str(String),
    Int(i64),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
}

fn tokenize(source: &str) -> RenderResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' | '\'' => {
                let (text, next) = read_quoted(&chars, i)?;
                tokens.push(Token::Str(text));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value = digits
                    .parse::<i64>()
                    .map_err(|e| RenderError::Syntax(format!("bad integer {digits:?}: {e}")))?;
                tokens.push(Token::Int(value));
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_continue(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => {
                return Err(RenderError::Syntax(format!(
                    "unexpected character {other:?}"
                )));
            }
        }
    }
    Ok(tokens)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Action and context names commonly carry dashes; treat them as part of
/// the identifier since the grammar has no arithmetic.
fn is_name_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn read_quoted(chars: &[char], start: usize) -> RenderResult<(String, usize)> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            text.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == quote {
            return Ok((text, i + 1));
        }
        text.push(c);
        i += 1;
    }
    Err(RenderError::Syntax("unterminated string literal".into()))
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token, what: &str) -> RenderResult<()> {
        match self.advance() {
            Some(ref t) if t == token => Ok(()),
            other => Err(RenderError::Syntax(format!(
                "expected {what}, got {other:?}"
            ))),
        }
    }

    fn parse_atom(&mut self) -> RenderResult<Expr> {
        match self.advance() {
            Some(Token::Name(name)) => Ok(Expr::Name(name)),
            Some(Token::Str(text)) => Ok(Expr::Str(text)),
            Some(Token::Int(value)) => Ok(Expr::Int(value)),
            other => Err(RenderError::Syntax(format!(
                "expected a name or literal, got {other:?}"
            ))),
        }
    }

    fn parse_postfix(&mut self) -> RenderResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.position += 1;
                    let attr = match self.advance() {
                        Some(Token::Name(name)) => name,
                        // Quoted attribute names support keys with
                        // spaces and dots: outcomes.Foo.'weird key'.
                        Some(Token::Str(text)) => text,
                        other => {
                            return Err(RenderError::Syntax(format!(
                                "expected an attribute name after '.', got {other:?}"
                            )));
                        }
                    };
                    expr = Expr::Attr(Box::new(expr), attr);
                }
                Some(Token::LBracket) => {
                    self.position += 1;
                    let index = self.parse_postfix()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    self.position += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.parse_postfix()?);
                            match self.peek() {
                                Some(Token::Comma) => {
                                    self.position += 1;
                                }
                                _ => break,
                            }
                        }
                    }
                    self.expect(&Token::RParen, "')'")?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => break,
            }
        }
        Ok(expr)
    }
}

/// Parse an expression body (the inside of `@{ ... }`).
pub fn parse(source: &str) -> RenderResult<Expr> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        position: 0,
    };
    if parser.tokens.is_empty() {
        return Err(RenderError::Syntax("empty expression".into()));
    }
    let expr = parser.parse_postfix()?;
    if parser.position != parser.tokens.len() {
        return Err(RenderError::Syntax(format!(
            "trailing tokens after expression: {:?}",
            &parser.tokens[parser.position..]
        )));
    }
    Ok(expr)
}
