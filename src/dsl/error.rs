//! Error types for the filter DSL.
//!
//! Every failure happens while compiling. A compiled [`Predicate`](super::Predicate)
//! cannot fail.

use thiserror::Error;

use super::lexer::TokenKind;

/// A character the lexer has no rule for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized character {ch:?} at position {position}")]
pub struct LexError {
    /// Byte offset into the source expression.
    pub position: usize,
    pub ch: char,
}

/// Grammar violations reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected} at position {position}, found {found}")]
    Unexpected {
        expected: String,
        found: TokenKind,
        position: usize,
    },

    /// The input ended inside an `in (...)` list.
    #[error("unterminated value list starting at position {position}")]
    UnterminatedSet { position: usize },

    /// The expression is a bare literal or property name with no operator.
    #[error("expression has no operator and cannot be used as a filter")]
    Incomplete,

    /// Nesting or operator count beyond what the parser accepts.
    #[error("expression is too deeply nested or has too many operators (at position {position})")]
    TooComplex { position: usize },

    #[error("operator '{op}' cannot be applied to {operand} at position {position}")]
    InvalidOperand {
        op: &'static str,
        operand: &'static str,
        position: usize,
    },
}

/// Any error returned by [`compile`](super::compile).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl FilterError {
    /// Byte offset of the failure, when it points at a specific place.
    pub fn position(&self) -> Option<usize> {
        match self {
            FilterError::Lex(e) => Some(e.position),
            FilterError::Parse(ParseError::Unexpected { position, .. })
            | FilterError::Parse(ParseError::UnterminatedSet { position })
            | FilterError::Parse(ParseError::TooComplex { position })
            | FilterError::Parse(ParseError::InvalidOperand { position, .. }) => Some(*position),
            FilterError::Parse(ParseError::Incomplete) => None,
        }
    }
}

/// Malformed structured filter (wrong array shape or element types).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdaptError {
    #[error("structured filter must be an array, got {0}")]
    NotAnArray(String),

    #[error("condition must be [operator, property, value], got {0}")]
    BadCondition(String),

    #[error("unknown combinator '{0}', expected 'all' or 'any'")]
    UnknownCombinator(String),
}
