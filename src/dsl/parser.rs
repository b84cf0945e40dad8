//! Parser for the filter DSL.
//!
//! Grammar (in rough EBNF), lowest precedence first:
//!
//! expr       = or_expr
//! or_expr    = and_expr ("or" and_expr)*
//! and_expr   = in_expr ("and" in_expr)*
//! in_expr    = like_expr (("in" | "not" "in") value_list)*
//! like_expr  = eq_expr ("like" eq_expr)*
//! eq_expr    = rel_expr (("==" | "!=") rel_expr)*
//! rel_expr   = not_expr (("<" | "<=" | ">" | ">=") not_expr)*
//! not_expr   = "not" not_expr | neg_expr
//! neg_expr   = "-" neg_expr | primary
//! primary    = NUMBER | STRING | SYMBOL | "(" expr ")"
//! value_list = "(" expr ("," expr)* ")"
//!
//! Inputs nested more than 64 levels deep, or using more than 2048 binary,
//! membership and `like` operators, fail with [`ParseError::TooComplex`].
//! Values inside an `in (...)` list don't count towards the operator limit.

use super::ast::{BinaryOp, Expr, Literal};
use super::error::{FilterError, ParseError};
use super::lexer::{Token, TokenKind, tokenize};

/// Deepest allowed nesting of parentheses, prefix operators and value lists.
const MAX_NESTING: usize = 64;

/// Most binary operators in one expression. Chains build left-nested trees,
/// so this bounds the depth the evaluator recurses through.
const MAX_OPERATORS: usize = 2048;

/// Parser state.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    operators: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let position = tokens
                .last()
                .map(|t| t.position + t.lexeme.len())
                .unwrap_or(0);
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                position,
            });
        }
        Parser {
            tokens,
            pos: 0,
            nesting: 0,
            operators: 0,
        }
    }

    fn peek(&self) -> &Token {
        // `new` guarantees a trailing Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.peek();
        ParseError::Unexpected {
            expected: expected.to_string(),
            found: tok.kind,
            position: tok.position,
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(ParseError::TooComplex {
                position: self.peek().position,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    /// Consume an infix operator token, counting it against the limit.
    fn operator(&mut self) -> Result<Token, ParseError> {
        let tok = self.advance();
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(ParseError::TooComplex {
                position: tok.position,
            });
        }
        Ok(tok)
    }

    /// Parse a full expression (lowest precedence level).
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or_expr()
    }

    /// Parse OR expression: and_expr ("or" and_expr)*
    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.peek_kind() == TokenKind::Or {
            self.operator()?;
            let right = self.parse_and_expr()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }

        Ok(left)
    }

    /// Parse AND expression: in_expr ("and" in_expr)*
    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_in_expr()?;

        while self.peek_kind() == TokenKind::And {
            self.operator()?;
            let right = self.parse_in_expr()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }

        Ok(left)
    }

    /// Parse membership: like_expr (("in" | "not" "in") value_list)*
    fn parse_in_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_like_expr()?;

        loop {
            let negated = match (self.peek_kind(), self.peek_kind_at(1)) {
                (TokenKind::In, _) => false,
                (TokenKind::Not, TokenKind::In) => true,
                _ => break,
            };
            if negated {
                self.advance(); // consume not
            }
            self.operator()?; // consume in

            let values = self.parse_value_list()?;
            left = Expr::InSet {
                left: Box::new(left),
                negated,
                values,
            };
        }

        Ok(left)
    }

    /// Parse value list: "(" expr ("," expr)* ")"
    fn parse_value_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let open = self.expect(TokenKind::LParen, "'(' after 'in'")?;
        let unterminated = ParseError::UnterminatedSet {
            position: open.position,
        };

        self.enter()?;
        let mut values = Vec::new();
        loop {
            if self.peek_kind() == TokenKind::Eof {
                return Err(unterminated);
            }

            let value = self.parse_expr().map_err(|e| match e {
                ParseError::Unexpected {
                    found: TokenKind::Eof,
                    ..
                } => unterminated.clone(),
                other => other,
            })?;
            values.push(value);

            match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => return Err(unterminated),
                _ => return Err(self.unexpected("',' or ')' in value list")),
            }
        }
        self.leave();

        Ok(values)
    }

    /// Parse LIKE expression: eq_expr ("like" eq_expr)*
    fn parse_like_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_eq_expr()?;

        while self.peek_kind() == TokenKind::Like {
            self.operator()?;
            let right = self.parse_eq_expr()?;
            left = Expr::binary(BinaryOp::Like, left, right);
        }

        Ok(left)
    }

    /// Parse equality: rel_expr (("==" | "!=") rel_expr)*
    fn parse_eq_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_rel_expr()?;

        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Neq => BinaryOp::Neq,
                _ => break,
            };
            self.operator()?;
            let right = self.parse_rel_expr()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse ordering comparison: not_expr (("<" | "<=" | ">" | ">=") not_expr)*
    fn parse_rel_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expr()?;

        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Lte,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Gte,
                _ => break,
            };
            self.operator()?;
            let right = self.parse_not_expr()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse prefix NOT: "not" not_expr | neg_expr
    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek_kind() != TokenKind::Not {
            return self.parse_neg_expr();
        }

        self.advance(); // consume not
        self.enter()?;
        let inner = self.parse_not_expr()?;
        self.leave();
        Ok(Expr::Not(Box::new(inner)))
    }

    /// Parse unary minus: "-" neg_expr | primary
    fn parse_neg_expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek_kind() != TokenKind::Minus {
            return self.parse_primary();
        }

        let minus = self.advance();
        self.enter()?;
        let inner = self.parse_neg_expr()?;
        self.leave();

        if let Expr::Literal(Literal::String(_)) = inner {
            return Err(ParseError::InvalidOperand {
                op: "-",
                operand: "a string",
                position: minus.position,
            });
        }
        Ok(Expr::UnaryMinus(Box::new(inner)))
    }

    /// Parse primary expression: NUMBER | STRING | SYMBOL | "(" expr ")"
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            TokenKind::Number => {
                let tok = self.advance();
                let value = tok
                    .lexeme
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| ParseError::Unexpected {
                        expected: "a finite number".into(),
                        found: tok.kind,
                        position: tok.position,
                    })?;
                Ok(Expr::number(value))
            }
            TokenKind::String => Ok(Expr::string(self.advance().lexeme)),
            TokenKind::Symbol => Ok(Expr::PropertyRef(self.advance().lexeme)),
            TokenKind::LParen => {
                self.advance(); // consume (
                self.enter()?;
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                self.leave();
                Ok(inner)
            }
            _ => Err(self.unexpected("a value, property name or '('")),
        }
    }
}

/// Parse a token stream into an AST.
///
/// Rejects trailing tokens and expressions without any operator.
pub fn parse(tokens: Vec<Token>) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(tokens);
    let ast = parser.parse_expr()?;

    // Ensure we consumed all tokens
    if parser.peek_kind() != TokenKind::Eof {
        return Err(parser.unexpected("an operator or end of input"));
    }

    if ast.is_leaf() {
        return Err(ParseError::Incomplete);
    }

    Ok(ast)
}

/// Tokenize and parse a filter expression string.
pub fn parse_filter(input: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(input)?;
    Ok(parse(tokens)?)
}
