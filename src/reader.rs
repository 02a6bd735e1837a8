//! S-expression reader.
//!
//! Recursive descent over a byte cursor with one character of lookahead.
//! Whitespace is skipped before every token; `(` opens a list, `)` closes
//! one, and any other run of characters up to whitespace or a parenthesis is
//! an atom. An atom made only of ASCII digits is an integer, anything else
//! (including `-5` and `3x`) is interned as a symbol. Inside a list an atom
//! that is exactly `.` introduces the dotted tail of an improper list.
//!
//! Lexing of whitespace, comments and atom tokens uses `nom`; list structure
//! is driven by hand so that nesting is the only source of recursion.

use nom::{
    IResult, Parser,
    bytes::complete::{take_till, take_till1, take_while},
    character::complete::{char, digit1},
    combinator::all_consuming,
    sequence::preceded,
};

use crate::ast::{FIXNUM_MAX, FIXNUM_MIN, NumberType, Value};
use crate::symbols::SymbolTable;
use crate::{Error, ParseError, ParseErrorKind};

/// Token that separates a list's elements from its dotted tail
const DOT: &str = ".";

/// Reader options.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParseConfig {
    /// Treat `;` as the start of a comment running to the end of the line
    pub handle_comments: bool,
}

fn is_delimiter(c: char) -> bool {
    c == '(' || c == ')' || c.is_whitespace()
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(char(';'), take_till(|c| c == '\n')).parse(input)
}

/// Longest run of characters up to a delimiter (and `;` when comments are on)
fn atom_token(input: &str, handle_comments: bool) -> IResult<&str, &str> {
    take_till1(|c| is_delimiter(c) || (handle_comments && c == ';')).parse(input)
}

fn integer_digits(input: &str) -> IResult<&str, &str> {
    all_consuming(digit1).parse(input)
}

struct Reader<'a, 's> {
    input: &'a str,
    offset: usize,
    symbols: &'s mut SymbolTable,
    config: ParseConfig,
}

impl<'a, 's> Reader<'a, 's> {
    fn new(input: &'a str, symbols: &'s mut SymbolTable, config: ParseConfig) -> Self {
        Reader {
            input,
            offset: 0,
            symbols,
            config,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.offset..]
    }

    fn advance_to(&mut self, rest: &'a str) {
        self.offset = self.input.len() - rest.len();
    }

    fn at_end(&self) -> bool {
        self.offset == self.input.len()
    }

    fn error(&self, kind: ParseErrorKind, message: &str, found: Option<&str>) -> Error {
        Error::ParseError(ParseError::with_context_and_found(
            kind,
            message,
            self.input,
            self.offset,
            found.map(str::to_owned),
        ))
    }

    fn skip_space(&mut self) {
        loop {
            if let Ok((rest, _)) = whitespace(self.remaining()) {
                self.advance_to(rest);
            }
            if self.config.handle_comments
                && let Ok((rest, _)) = comment(self.remaining())
            {
                self.advance_to(rest);
                continue;
            }
            break;
        }
    }

    /// Skip whitespace and peek at the next character, failing at end of input
    fn next_char(&mut self) -> Result<char, Error> {
        self.skip_space();
        self.remaining()
            .chars()
            .next()
            .ok_or_else(|| self.error(ParseErrorKind::Incomplete, "unexpected end of input", None))
    }

    fn peek_token(&self) -> Option<&'a str> {
        atom_token(self.remaining(), self.config.handle_comments)
            .ok()
            .map(|(_, token)| token)
    }

    fn parse_expression(&mut self) -> Result<Value, Error> {
        match self.next_char()? {
            '(' => {
                self.offset += 1;
                self.parse_list()
            }
            ')' => Err(self.error(
                ParseErrorKind::InvalidSyntax,
                "improper end to list",
                Some(")"),
            )),
            _ => self.parse_atom(),
        }
    }

    /// Parse list elements after the opening parenthesis
    fn parse_list(&mut self) -> Result<Value, Error> {
        let mut contents = Vec::new();
        loop {
            if self.next_char()? == ')' {
                self.offset += 1;
                return Ok(Value::list(contents, Value::nil()));
            }

            if self.peek_token() == Some(DOT) {
                if contents.is_empty() {
                    return Err(self.error(
                        ParseErrorKind::InvalidSyntax,
                        "leading . in list",
                        Some(DOT),
                    ));
                }
                self.offset += DOT.len();
                let tail = self.parse_expression()?;
                let close = self.next_char()?;
                if close != ')' {
                    let found = self.peek_token().map_or_else(|| close.to_string(), str::to_owned);
                    return Err(self.error(
                        ParseErrorKind::InvalidSyntax,
                        "improper improper list: expected ) after dotted tail",
                        Some(&found),
                    ));
                }
                self.offset += 1;
                return Ok(Value::list(contents, tail));
            }

            contents.push(self.parse_expression()?);
        }
    }

    fn parse_atom(&mut self) -> Result<Value, Error> {
        let Ok((rest, token)) = atom_token(self.remaining(), self.config.handle_comments) else {
            return Err(self.error(ParseErrorKind::InvalidSyntax, "expected an atom", None));
        };

        if integer_digits(token).is_err() {
            self.advance_to(rest);
            return Ok(Value::symbol(self.symbols.intern(token)));
        }

        match token.parse::<NumberType>() {
            Ok(n) if (FIXNUM_MIN..=FIXNUM_MAX).contains(&n) => {
                self.advance_to(rest);
                Ok(Value::number(n))
            }
            _ => Err(self.error(
                ParseErrorKind::ImplementationLimit,
                &format!("integer literal out of range ({FIXNUM_MIN}..={FIXNUM_MAX})"),
                Some(token),
            )),
        }
    }
}

/// Parse the first expression in `input`, ignoring anything after it.
pub fn parse(input: &str, symbols: &mut SymbolTable) -> Result<Value, Error> {
    parse_with_config(input, symbols, ParseConfig::default())
}

/// [`parse`] with explicit reader options.
pub fn parse_with_config(
    input: &str,
    symbols: &mut SymbolTable,
    config: ParseConfig,
) -> Result<Value, Error> {
    Reader::new(input, symbols, config).parse_expression()
}

/// Parse every top-level expression in `input`.
///
/// Returns an empty vector for empty or all-whitespace input.
pub fn parse_all(input: &str, symbols: &mut SymbolTable) -> Result<Vec<Value>, Error> {
    parse_all_with_config(input, symbols, ParseConfig::default())
}

/// [`parse_all`] with explicit reader options.
pub fn parse_all_with_config(
    input: &str,
    symbols: &mut SymbolTable,
    config: ParseConfig,
) -> Result<Vec<Value>, Error> {
    let mut reader = Reader::new(input, symbols, config);
    let mut result = Vec::new();
    loop {
        reader.skip_space();
        if reader.at_end() {
            return Ok(result);
        }
        result.push(reader.parse_expression()?);
    }
}
