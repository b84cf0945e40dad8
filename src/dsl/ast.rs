//! AST types for the filter DSL.

use std::fmt;

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number or string constant: `42`, `"forest"`
    Literal(Literal),

    /// Attribute lookup: `kind`, `'land use'`
    PropertyRef(String),

    /// Numeric negation: `-depth`
    UnaryMinus(Box<Expr>),

    /// Boolean NOT: `not expr`
    Not(Box<Expr>),

    /// Binary operator: `a == 1`, `a and b`, `name like "park"`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Set membership: `kind in (1, 2)` or `kind not in (1, 2)`
    InSet {
        left: Box<Expr>,
        negated: bool,
        values: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Like => "like",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn property(name: impl Into<String>) -> Self {
        Expr::PropertyRef(name.into())
    }

    pub fn number(value: f64) -> Self {
        Expr::Literal(Literal::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    /// True for a bare literal or property reference: nothing to test.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Literal(_) | Expr::PropertyRef(_))
    }

    /// Names of every property the expression reads, in first-use order.
    pub fn properties(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_properties(&mut names);
        names
    }

    fn collect_properties<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::PropertyRef(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::UnaryMinus(inner) | Expr::Not(inner) => inner.collect_properties(names),
            Expr::Binary { left, right, .. } => {
                left.collect_properties(names);
                right.collect_properties(names);
            }
            Expr::InSet { left, values, .. } => {
                left.collect_properties(names);
                for value in values {
                    value.collect_properties(names);
                }
            }
        }
    }
}

/// Render a number the way it would be typed: `1` rather than `1.0`.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn is_bare_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !matches!(name, "and" | "or" | "not" | "in" | "like")
}

/// Fully parenthesized form that parses back to the same tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Literal::Number(n)) => f.write_str(&format_number(*n)),
            Expr::Literal(Literal::String(s)) => write!(f, "\"{}\"", s),
            Expr::PropertyRef(name) if is_bare_symbol(name) => f.write_str(name),
            Expr::PropertyRef(name) => write!(f, "'{}'", name),
            Expr::UnaryMinus(inner) => write!(f, "(-{})", inner),
            Expr::Not(inner) => write!(f, "(not {})", inner),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::InSet {
                left,
                negated,
                values,
            } => {
                let keyword = if *negated { "not in" } else { "in" };
                write!(f, "({} {} (", left, keyword)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("))")
            }
        }
    }
}
