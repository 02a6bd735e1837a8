//! minilisp - a minimal Lisp interpreter
//!
//! This crate reads s-expressions from text, represents them with a compact
//! four-variant value type and evaluates them against a mutable global
//! environment.
//!
//! ```scheme
//! (define x 5)      ; bind x, returns nil
//! (+ x 1 2)         ; => 8
//! (if nil 1 2)      ; => 2, only nil is false
//! (- 5 3 1)         ; => 1
//! (1 . 2)           ; improper list (reads fine, cannot be called)
//! ```
//!
//! ## Values
//!
//! A [`Value`](ast::Value) is a pair, an integer, an interned symbol or a
//! primitive function. Lists are chains of pairs ending in the `nil` symbol,
//! which also serves as the only false value. Integers carry a 62-bit payload
//! and wrap around silently; there is no overflow detection.
//!
//! ## Sessions
//!
//! There is no global state. An [`Environment`](evaluator::Environment) owns
//! the symbol table and the bindings for one session; the reader interns into
//! its table and the evaluator reads and writes its bindings. Sharing one
//! environment between threads requires wrapping it in a lock.
//!
//! ## Failure modes
//!
//! Every error aborts evaluation of the current top-level expression and is
//! returned as an [`Error`]. A `define` only commits its binding after the
//! right-hand side has evaluated, so a failed expression never changes the
//! environment.
//!
//! Reading and evaluation recurse once per level of nesting. Input nested
//! deeply enough to exhaust the host call stack aborts the process; this is
//! not reported as an [`Error`]. Long flat lists are handled iteratively.
//!
//! ## Modules
//!
//! - `symbols`: symbol interning
//! - `ast`: value representation and printing
//! - `reader`: s-expression parsing from text
//! - `evaluator`: environment and evaluation
//! - `builtinops`: primitive functions and special forms

use std::fmt;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (stray `)`, misplaced `.`)
    InvalidSyntax,
    /// Input ended before the expression was complete
    Incomplete,
    /// Implementation-imposed limit exceeded (integer literal out of range)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Byte offset into the input where the error was detected
    pub offset: usize,
    /// Context snippet from the input showing where the error occurred
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        Self::with_context_and_found(kind, message, input, error_offset, None)
    }

    /// Create a ParseError with context and found token
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const BEFORE: usize = 20;
        const MAX_CONTEXT: usize = 100;

        let error_offset = error_offset.min(input.len());
        let (head, tail) = input.split_at(error_offset);

        // Show a little of the input before the error
        let skipped = head.chars().count().saturating_sub(BEFORE);
        let before: String = head.chars().skip(skipped).collect();
        let after: String = tail.chars().take(MAX_CONTEXT - before.chars().count()).collect();

        let mut display_context = String::new();
        if skipped > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&before);
        display_context.push_str(&after);
        if after.len() < tail.len() {
            display_context.push_str("[...]");
        }

        // Replace newlines with visible markers for better error display
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        ParseError {
            kind,
            message: message.into(),
            offset: error_offset,
            context: Some(display_context),
            found,
        }
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed source text
    ParseError(ParseError),
    /// Symbol lookup miss; carries the symbol's name
    UnboundVariable(String),
    /// Special form invoked with the wrong operand count
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>, // Optional expression context
    },
    /// Variant mismatch where a specific variant is required
    TypeError(String),
    /// Zero divisor after the first operand of `/`
    DivisionByZero,
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// Attach the offending expression to an ArityError that has none yet.
    /// Other errors are returned unchanged.
    pub fn with_expression(self, expression: impl FnOnce() -> String) -> Self {
        match self {
            Error::ArityError {
                expected,
                got,
                expression: None,
            } => Error::arity_error_with_expr(expected, got, expression()),
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundVariable(var) => write!(f, "Unbound variable: {var}"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: expression {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: expected {expected} arguments but got {got}"
                ),
            },
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::DivisionByZero => write!(f, "Division by zero"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod reader;
pub mod symbols;

pub use ast::Value;
pub use evaluator::{Environment, create_global_env, eval};
pub use reader::{parse, parse_all};
pub use symbols::{SymbolId, SymbolTable};
