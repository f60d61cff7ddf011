//! Template string lexing.
//!
//! Splits a template into raw text and `@{ ... }` expression lexemes. A
//! literal `@` is escaped by doubling: `@@` always collapses to a single
//! `@` and never arms an expression, so for any string `s`, rendering
//! `s` with every `@` doubled reproduces `s` exactly.

use crate::error::{RenderError, RenderResult};

/// One lexeme of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme {
    /// Literal text to pass through untouched.
    Text(String),
    /// The inside of an `@{ ... }` pair, to be evaluated.
    Expression(String),
}

/// Lex a template into text and expression lexemes.
///
/// Expression bodies may contain nested braces, quoted strings (with
/// backslash escapes) and newlines; the closing brace is found by depth
/// tracking that ignores brace characters inside string literals.
pub fn lex(template: &str) -> RenderResult<Vec<Lexeme>> {
    let chars: Vec<char> = template.chars().collect();
    let mut lexemes = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '@' {
            if i + 1 < chars.len() && chars[i + 1] == '@' {
                // Escaped: collapse to a single literal '@'.
                text.push('@');
                i += 2;
                continue;
            }
            if i + 1 < chars.len() && chars[i + 1] == '{' {
                if !text.is_empty() {
                    lexemes.push(Lexeme::Text(std::mem::take(&mut text)));
                }
                let (expression, consumed) = read_expression(&chars, i + 2)
                    .ok_or(RenderError::UnclosedExpression(i))?;
                lexemes.push(Lexeme::Expression(expression));
                i = consumed;
                continue;
            }
        }
        text.push(chars[i]);
        i += 1;
    }

    if !text.is_empty() {
        lexemes.push(Lexeme::Text(text));
    }
    Ok(lexemes)
}

/// Scan an expression body starting right after `@{`.
///
/// Returns the body and the index just past the closing brace, or `None`
/// when the input ends before the expression closes.
fn read_expression(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut depth = 1usize;
    let mut body = String::new();
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let (literal, next) = read_string_literal(chars, i)?;
                body.push_str(&literal);
                i = next;
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((body, i + 1));
                }
            }
            _ => {}
        }
        body.push(c);
        i += 1;
    }
    None
}

/// Consume a quoted string literal, including its quotes.
fn read_string_literal(chars: &[char], start: usize) -> Option<(String, usize)> {
    let quote = chars[start];
    let mut literal = String::new();
    literal.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        literal.push(c);
        if c == '\\' && i + 1 < chars.len() {
            literal.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == quote {
            return Some((literal, i + 1));
        }
        i += 1;
    }
    None
}
