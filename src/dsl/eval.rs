//! Evaluator for the filter DSL AST.
//!
//! Evaluation is a tree walk over [`Expr`] and never fails: type mismatches
//! and missing attributes resolve to `false` rather than erroring.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ast::{BinaryOp, Expr, Literal, format_number};

/// Runtime value of an operand, borrowed from the AST or the attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    String(&'a str),
    /// Attribute absent, null, or of a type the DSL doesn't model.
    Missing,
}

impl Value<'_> {
    /// Boolean results are encoded as `1` / `0`.
    fn from_bool(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Missing => false,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Value::Number(n) => Some(format_number(*n)),
            Value::String(s) => Some((*s).to_string()),
            Value::Missing => None,
        }
    }
}

/// A flat dictionary of feature attributes.
pub trait Attributes {
    /// Resolve a property by name; absent properties are [`Value::Missing`].
    fn lookup(&self, name: &str) -> Value<'_>;
}

/// OSM-style tag maps: every value is a string.
impl Attributes for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Value<'_> {
        match self.get(name) {
            Some(v) => Value::String(v),
            None => Value::Missing,
        }
    }
}

fn json_scalar(value: &serde_json::Value) -> Value<'_> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map_or(Value::Missing, Value::Number),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Bool(b) => Value::from_bool(*b),
        _ => Value::Missing,
    }
}

/// JSON objects such as GeoJSON `properties`.
///
/// A dotted name is first looked up as a flat key, then as a path into
/// nested objects.
impl Attributes for serde_json::Map<String, serde_json::Value> {
    fn lookup(&self, name: &str) -> Value<'_> {
        if let Some(value) = self.get(name) {
            return json_scalar(value);
        }
        if !name.contains('.') {
            return Value::Missing;
        }

        let mut parts = name.split('.');
        let mut current = parts.next().and_then(|first| self.get(first));
        for part in parts {
            current = current.and_then(|v| v.as_object()).and_then(|o| o.get(part));
        }
        current.map_or(Value::Missing, json_scalar)
    }
}

impl Attributes for serde_json::Value {
    fn lookup(&self, name: &str) -> Value<'_> {
        match self.as_object() {
            Some(map) => map.lookup(name),
            None => Value::Missing,
        }
    }
}

impl<A: Attributes + ?Sized> Attributes for &A {
    fn lookup(&self, name: &str) -> Value<'_> {
        (**self).lookup(name)
    }
}

/// Typed equality: numbers with numbers, strings with strings. Missing is
/// equal to nothing, itself included.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

fn values_ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    match op {
        BinaryOp::Eq => values_equal(left, right),
        BinaryOp::Neq => !values_equal(left, right),
        BinaryOp::Lt => values_ordering(left, right) == Some(Ordering::Less),
        BinaryOp::Lte => matches!(
            values_ordering(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ),
        BinaryOp::Gt => values_ordering(left, right) == Some(Ordering::Greater),
        BinaryOp::Gte => matches!(
            values_ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Like => false,
    }
}

/// Case-insensitive substring match. The pattern is plain text, not a regex.
fn like(left: &Value, right: &Value) -> bool {
    match (left.text(), right.text()) {
        (Some(haystack), Some(needle)) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        _ => false,
    }
}

/// Evaluate an expression to a value.
pub fn evaluate<'a, A>(expr: &'a Expr, attrs: &'a A) -> Value<'a>
where
    A: Attributes + ?Sized,
{
    match expr {
        Expr::Literal(Literal::Number(n)) => Value::Number(*n),
        Expr::Literal(Literal::String(s)) => Value::String(s),
        Expr::PropertyRef(name) => attrs.lookup(name),

        Expr::UnaryMinus(inner) => match evaluate(inner, attrs) {
            Value::Number(n) => Value::Number(-n),
            _ => Value::Missing,
        },

        Expr::Not(inner) => Value::from_bool(!evaluate(inner, attrs).is_truthy()),

        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => Value::from_bool(
            evaluate(left, attrs).is_truthy() && evaluate(right, attrs).is_truthy(),
        ),

        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => Value::from_bool(
            evaluate(left, attrs).is_truthy() || evaluate(right, attrs).is_truthy(),
        ),

        Expr::Binary {
            op: BinaryOp::Like,
            left,
            right,
        } => Value::from_bool(like(&evaluate(left, attrs), &evaluate(right, attrs))),

        Expr::Binary { op, left, right } => Value::from_bool(compare(
            *op,
            &evaluate(left, attrs),
            &evaluate(right, attrs),
        )),

        Expr::InSet {
            left,
            negated,
            values,
        } => {
            let needle = evaluate(left, attrs);
            let found = values
                .iter()
                .any(|v| values_equal(&needle, &evaluate(v, attrs)));
            Value::from_bool(found != *negated)
        }
    }
}

/// Evaluate an expression as a filter.
pub fn evaluate_filter<A>(expr: &Expr, attrs: &A) -> bool
where
    A: Attributes + ?Sized,
{
    evaluate(expr, attrs).is_truthy()
}

/// A compiled filter: a reusable test over a feature's attributes.
///
/// Cloning is cheap and predicates can be shared across threads.
#[derive(Clone)]
pub struct Predicate {
    expr: Arc<Expr>,
    source: Arc<str>,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("source", &self.source)
            .finish()
    }
}

impl Predicate {
    /// Wrap an already-parsed expression. The canonical rendering of the
    /// tree becomes the predicate's source.
    pub fn new(expr: Expr) -> Self {
        let source = expr.to_string();
        Self::with_source(expr, &source)
    }

    pub(crate) fn with_source(expr: Expr, source: &str) -> Self {
        Predicate {
            expr: Arc::new(expr),
            source: Arc::from(source),
        }
    }

    /// Test a feature's attributes.
    pub fn matches<A>(&self, attrs: &A) -> bool
    where
        A: Attributes + ?Sized,
    {
        evaluate_filter(&self.expr, attrs)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}
