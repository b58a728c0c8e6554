//! Cell input parsing.
//!
//! Input starting with `=` is a formula; anything else is a literal. Numeric
//! literals (optionally signed, with an optional exponent) become numbers and
//! everything else is kept verbatim as text.
//!
//! Formula grammar, lowest precedence first:
//!
//! ```text
//! comparison := additive (("<" | "<=" | ">" | ">=" | "=" | "<>") additive)*
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := ("-" | "+") unary | power
//! power      := primary ("^" ("-" | "+")* primary)*
//! primary    := number | string | ref | ref ":" ref | name "(" args ")" | "(" comparison ")"
//! ```
//!
//! The parser never builds trees itself; it drives an [`ExprBuilder`].

use regex::Regex;
use std::sync::OnceLock;

use super::builder::{ExprBuilder, StackBuilder};
use super::error::ParseError;
use super::expr::Expr;

/// Maximum nesting of parentheses, unary operators and function calls.
pub const MAX_NESTING: usize = 256;

fn number_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$")
            .expect("number literal regex must compile")
    })
}

/// Parse a non-formula literal as a number, if it looks like one.
pub fn parse_number_literal(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if number_literal_re().is_match(trimmed) {
        trimmed.parse::<f64>().ok()
    } else {
        None
    }
}

/// Parse cell input (formula or literal) into `builder`.
pub fn parse_input<B: ExprBuilder + ?Sized>(input: &str, builder: &mut B) -> Result<(), ParseError> {
    if let Some(formula) = input.strip_prefix('=') {
        return parse_formula(formula, builder);
    }
    match parse_number_literal(input) {
        Some(n) => builder.push_number(n),
        None => builder.push_text(input.to_string()),
    }
    Ok(())
}

/// Parse formula text (without the leading `=`) into `builder`.
pub fn parse_formula<B: ExprBuilder + ?Sized>(formula: &str, builder: &mut B) -> Result<(), ParseError> {
    let tokens = tokenize(formula)?;
    let mut parser = Parser {
        tokens,
        next: 0,
        depth: 0,
        builder,
    };
    parser.parse_comparison()?;
    match parser.peek() {
        None => Ok(()),
        Some(spanned) => Err(parser.unexpected(spanned)),
    }
}

/// Parse cell input straight into an expression tree.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    let mut builder = StackBuilder::new();
    parse_input(input, &mut builder)?;
    builder.finish()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    /// Cell reference or function name; the parser decides by context.
    Word(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Colon,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let simple = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '=' => Some(Token::Eq),
            _ => None,
        };
        if let Some(token) = simple {
            chars.next();
            tokens.push(Spanned { token, offset });
            continue;
        }

        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '<' => {
                chars.next();
                let token = match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        Token::Le
                    }
                    Some(&(_, '>')) => {
                        chars.next();
                        Token::Ne
                    }
                    _ => Token::Lt,
                };
                tokens.push(Spanned { token, offset });
            }
            '>' => {
                chars.next();
                let token = if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    Token::Ge
                } else {
                    Token::Gt
                };
                tokens.push(Spanned { token, offset });
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => {
                            // A doubled quote is an escaped quote.
                            if let Some(&(_, '"')) = chars.peek() {
                                chars.next();
                                text.push('"');
                            } else {
                                break;
                            }
                        }
                        Some((_, ch)) => text.push(ch),
                        None => return Err(ParseError::UnterminatedString),
                    }
                }
                tokens.push(Spanned {
                    token: Token::Text(text),
                    offset,
                });
            }
            c if c.is_ascii_digit() || c == '.' => {
                let end = scan_number(input, offset);
                let literal = &input[offset..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber(literal.to_string()))?;
                while chars.peek().is_some_and(|&(idx, _)| idx < end) {
                    chars.next();
                }
                tokens.push(Spanned {
                    token: Token::Number(value),
                    offset,
                });
            }
            c if c.is_ascii_alphabetic() || c == '$' => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: Token::Word(word),
                    offset,
                });
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    offset,
                    found: other.to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

/// Byte offset just past the number literal starting at `start`.
fn scan_number(input: &str, start: usize) -> usize {
    let bytes = input.as_bytes();
    let mut idx = start;
    let digits = |mut idx: usize| {
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        idx
    };

    idx = digits(idx);
    if idx < bytes.len() && bytes[idx] == b'.' {
        idx = digits(idx + 1);
    }
    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        let mut exp = idx + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            idx = digits(exp);
        }
    }
    idx
}

struct Parser<'b, B: ?Sized> {
    tokens: Vec<Spanned>,
    next: usize,
    depth: usize,
    builder: &'b mut B,
}

impl<B: ExprBuilder + ?Sized> Parser<'_, B> {
    fn peek(&self) -> Option<Spanned> {
        self.tokens.get(self.next).cloned()
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.next).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.next).cloned();
        if spanned.is_some() {
            self.next += 1;
        }
        spanned
    }

    fn unexpected(&self, spanned: Spanned) -> ParseError {
        let found = match spanned.token {
            Token::Number(n) => n.to_string(),
            Token::Text(s) => format!("\"{s}\""),
            Token::Word(w) => w,
            other => format!("{other:?}"),
        };
        ParseError::UnexpectedToken {
            offset: spanned.offset,
            found,
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        match self.advance() {
            Some(spanned) if spanned.token == token => Ok(()),
            Some(spanned) => Err(self.unexpected(spanned)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<F>(&mut self, f: F) -> Result<(), ParseError>
    where
        F: FnOnce(&mut Self) -> Result<(), ParseError>,
    {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_comparison(&mut self) -> Result<(), ParseError> {
        self.parse_additive()?;
        loop {
            let op: fn(&mut B) -> Result<(), ParseError> = match self.peek_token() {
                Some(Token::Lt) => B::op_lt,
                Some(Token::Le) => B::op_le,
                Some(Token::Gt) => B::op_gt,
                Some(Token::Ge) => B::op_ge,
                Some(Token::Eq) => B::op_eq,
                Some(Token::Ne) => B::op_ne,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_additive()?;
            op(&mut *self.builder)?;
        }
    }

    fn parse_additive(&mut self) -> Result<(), ParseError> {
        self.parse_term()?;
        loop {
            let op: fn(&mut B) -> Result<(), ParseError> = match self.peek_token() {
                Some(Token::Plus) => B::op_add,
                Some(Token::Minus) => B::op_sub,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_term()?;
            op(&mut *self.builder)?;
        }
    }

    fn parse_term(&mut self) -> Result<(), ParseError> {
        self.parse_unary()?;
        loop {
            let op: fn(&mut B) -> Result<(), ParseError> = match self.peek_token() {
                Some(Token::Star) => B::op_mul,
                Some(Token::Slash) => B::op_div,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_unary()?;
            op(&mut *self.builder)?;
        }
    }

    fn parse_unary(&mut self) -> Result<(), ParseError> {
        match self.peek_token() {
            Some(Token::Minus) => {
                self.advance();
                self.nested(|p| p.parse_unary())?;
                self.builder.op_neg()
            }
            Some(Token::Plus) => {
                self.advance();
                self.nested(|p| p.parse_unary())
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<(), ParseError> {
        self.parse_primary()?;
        while let Some(Token::Caret) = self.peek_token() {
            self.advance();
            self.parse_exponent()?;
            self.builder.op_pow()?;
        }
        Ok(())
    }

    fn parse_exponent(&mut self) -> Result<(), ParseError> {
        match self.peek_token() {
            Some(Token::Minus) => {
                self.advance();
                self.nested(|p| p.parse_exponent())?;
                self.builder.op_neg()
            }
            Some(Token::Plus) => {
                self.advance();
                self.nested(|p| p.parse_exponent())
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<(), ParseError> {
        let Some(spanned) = self.advance() else {
            return Err(ParseError::UnexpectedEnd);
        };

        match spanned.token {
            Token::Number(n) => {
                self.builder.push_number(n);
                Ok(())
            }
            Token::Text(s) => {
                self.builder.push_text(s);
                Ok(())
            }
            Token::LParen => {
                self.nested(|p| p.parse_comparison())?;
                self.expect(Token::RParen)
            }
            Token::Word(word) => match self.peek_token() {
                Some(Token::LParen) => {
                    self.advance();
                    self.nested(|p| p.parse_call(&word))
                }
                Some(Token::Colon) => {
                    self.advance();
                    match self.advance() {
                        Some(Spanned {
                            token: Token::Word(end),
                            ..
                        }) => self.builder.push_range(&format!("{word}:{end}")),
                        Some(other) => Err(self.unexpected(other)),
                        None => Err(ParseError::UnexpectedEnd),
                    }
                }
                _ => self.builder.push_reference(&word),
            },
            _ => Err(self.unexpected(spanned)),
        }
    }

    /// Arguments of a call whose `name(` has been consumed.
    fn parse_call(&mut self, name: &str) -> Result<(), ParseError> {
        let mut arg_count = 0;
        if let Some(Token::RParen) = self.peek_token() {
            self.advance();
        } else {
            loop {
                self.parse_comparison()?;
                arg_count += 1;
                match self.advance() {
                    Some(Spanned {
                        token: Token::Comma,
                        ..
                    }) => continue,
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => break,
                    Some(other) => return Err(self.unexpected(other)),
                    None => return Err(ParseError::UnexpectedEnd),
                }
            }
        }
        self.builder.push_function_call(name, arg_count)
    }
}
