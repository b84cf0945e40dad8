//! Lexer/tokenizer for the filter DSL.

use std::fmt;

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, delimited, not, opt, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

use super::error::LexError;

/// Token kinds for the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,
    Minus,  // -

    // Comparison operators
    Eq,  // ==
    Neq, // !=
    Ge,  // >=
    Le,  // <=
    Lt,  // <
    Gt,  // >

    // Keywords
    And,
    Or,
    Not,
    In,
    Like,

    // Values
    Number,
    Symbol,
    String,

    // End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Minus => "'-'",
            TokenKind::Eq => "'=='",
            TokenKind::Neq => "'!='",
            TokenKind::Ge => "'>='",
            TokenKind::Le => "'<='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::In => "'in'",
            TokenKind::Like => "'like'",
            TokenKind::Number => "number",
            TokenKind::Symbol => "property name",
            TokenKind::String => "string",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A lexed token.
///
/// For `String` and quoted `Symbol` tokens the lexeme is the text between the
/// quotes. `position` is a byte offset into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: usize,
}

type PResult<T> = Result<T, ErrMode<ContextError>>;

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// A keyword only matches when the next character can't continue a symbol,
/// so `android` stays a single symbol.
fn keyword<'s>(
    word: &'static str,
    kind: TokenKind,
) -> impl Parser<&'s str, (TokenKind, &'s str), ErrMode<ContextError>> {
    terminated(word, not(one_of(is_symbol_char))).map(move |s| (kind, s))
}

fn lex_number<'s>(input: &mut &'s str) -> PResult<(TokenKind, &'s str)> {
    (digit1, opt(('.', digit1)))
        .take()
        .map(|s| (TokenKind::Number, s))
        .parse_next(input)
}

fn lex_symbol<'s>(input: &mut &'s str) -> PResult<(TokenKind, &'s str)> {
    (
        one_of(|c: char| c.is_ascii_alphabetic()),
        take_while(0.., is_symbol_char),
    )
        .take()
        .map(|s| (TokenKind::Symbol, s))
        .parse_next(input)
}

/// `'some name'` is a property reference, not a string.
fn lex_quoted_symbol<'s>(input: &mut &'s str) -> PResult<(TokenKind, &'s str)> {
    delimited('\'', take_till(0.., '\''), '\'')
        .map(|s| (TokenKind::Symbol, s))
        .parse_next(input)
}

fn lex_string<'s>(input: &mut &'s str) -> PResult<(TokenKind, &'s str)> {
    delimited('"', take_till(0.., '"'), '"')
        .map(|s| (TokenKind::String, s))
        .parse_next(input)
}

fn lex_operator<'s>(input: &mut &'s str) -> PResult<(TokenKind, &'s str)> {
    alt((
        "(".map(|s| (TokenKind::LParen, s)),
        ")".map(|s| (TokenKind::RParen, s)),
        ",".map(|s| (TokenKind::Comma, s)),
        // Multi-char operators before their prefixes
        "==".map(|s| (TokenKind::Eq, s)),
        "!=".map(|s| (TokenKind::Neq, s)),
        ">=".map(|s| (TokenKind::Ge, s)),
        "<=".map(|s| (TokenKind::Le, s)),
        "<".map(|s| (TokenKind::Lt, s)),
        ">".map(|s| (TokenKind::Gt, s)),
        "-".map(|s| (TokenKind::Minus, s)),
    ))
    .parse_next(input)
}

fn lex_keyword<'s>(input: &mut &'s str) -> PResult<(TokenKind, &'s str)> {
    alt((
        keyword("and", TokenKind::And),
        keyword("or", TokenKind::Or),
        keyword("not", TokenKind::Not),
        keyword("in", TokenKind::In),
        keyword("like", TokenKind::Like),
    ))
    .parse_next(input)
}

/// Lex a single token (whitespace already skipped).
fn lex_token<'s>(input: &mut &'s str) -> PResult<(TokenKind, &'s str)> {
    alt((
        lex_operator,
        lex_keyword,
        lex_number,
        lex_symbol,
        lex_quoted_symbol,
        lex_string,
    ))
    .parse_next(input)
}

fn skip_whitespace(input: &mut &str) {
    let _: PResult<&str> = multispace0.parse_next(input);
}

/// Tokenize the entire input. The result always ends with an `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut remaining = source;
    let mut tokens = Vec::new();

    loop {
        skip_whitespace(&mut remaining);
        let position = source.len() - remaining.len();

        let Some(ch) = remaining.chars().next() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                position,
            });
            return Ok(tokens);
        };

        let before = remaining;
        match lex_token(&mut remaining) {
            Ok((kind, lexeme)) => tokens.push(Token {
                kind,
                lexeme: lexeme.to_string(),
                position,
            }),
            Err(_) => {
                remaining = before;
                tracing::debug!("Lexer stopped at {:?}", remaining);
                return Err(LexError { position, ch });
            }
        }
    }
}
