//! Filter expression DSL for feature attributes.
//!
//! Syntax:
//!   a == 1, a != 1          - typed equality
//!   a < 1, a <= 1, ...      - numeric or lexical ordering
//!   name like "park"        - case-insensitive substring match
//!   kind in (1, 2, 3)       - set membership (also `not in`)
//!   expr1 and expr2         - AND
//!   expr1 or expr2          - OR (lower precedence than and)
//!   not expr                - NOT
//!   -expr                   - numeric negation
//!   (expr)                  - grouping
//!   "text"                  - string literal
//!   'land use'              - property name containing spaces or punctuation
//!
//! A bare property or literal (`name`, `42`) is rejected: every filter needs
//! at least one operator.

mod adapter;
mod ast;
mod error;
mod eval;
mod lexer;
mod parser;

pub use adapter::{Combinator, Condition, StructuredFilter, adapt};
pub use ast::*;
pub use error::{AdaptError, FilterError, LexError, ParseError};
pub use eval::{Attributes, Predicate, Value, evaluate, evaluate_filter};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{parse, parse_filter};

/// Compile an expression string into a [`Predicate`].
pub fn compile(source: &str) -> Result<Predicate, FilterError> {
    let expr = parse_filter(source)?;
    tracing::debug!("Compiled filter {:?} as {}", source, expr);
    Ok(Predicate::with_source(expr, source))
}
