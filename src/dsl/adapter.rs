//! Structured (array) filters used by style rules, rendered as DSL text.
//!
//! `["==", "kind", 1]` or `["all" | "any", condition, condition, ...]`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AdaptError;

/// How the conditions of a boxed filter are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    All,
    Any,
}

impl Combinator {
    fn keyword(self) -> &'static str {
        match self {
            Combinator::All => "all",
            Combinator::Any => "any",
        }
    }

    fn joiner(self) -> &'static str {
        match self {
            Combinator::All => " and ",
            Combinator::Any => " or ",
        }
    }
}

/// A single `[operator, property, value]` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub operator: String,
    pub property: String,
    pub value: Value,
}

impl Condition {
    pub fn new(operator: impl Into<String>, property: impl Into<String>, value: Value) -> Self {
        Condition {
            operator: operator.into(),
            property: property.into(),
            value,
        }
    }

    fn to_json(&self) -> Value {
        Value::Array(vec![
            Value::String(self.operator.clone()),
            Value::String(self.property.clone()),
            self.value.clone(),
        ])
    }
}

/// Value text as written into the expression. Strings are NOT quoted, so a
/// string value reads as a property name (or a number) once compiled.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.property,
            self.operator,
            render_value(&self.value)
        )
    }
}

impl TryFrom<&Value> for Condition {
    type Error = AdaptError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let bad = || AdaptError::BadCondition(value.to_string());
        let [op, property, operand] = value.as_array().map(Vec::as_slice).ok_or_else(bad)? else {
            return Err(bad());
        };
        let (Some(op), Some(property)) = (op.as_str(), property.as_str()) else {
            return Err(bad());
        };
        Ok(Condition::new(op, property, operand.clone()))
    }
}

/// A structured filter: one condition, or conditions boxed under
/// `"all"` / `"any"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum StructuredFilter {
    Condition(Condition),
    Combined {
        combinator: Combinator,
        conditions: Vec<Condition>,
    },
}

impl TryFrom<Value> for StructuredFilter {
    type Error = AdaptError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Some(items) = value.as_array() else {
            return Err(AdaptError::NotAnArray(value.to_string()));
        };

        let combinator = match items.first().and_then(Value::as_str) {
            Some("all") => Combinator::All,
            Some("any") => Combinator::Any,
            Some(_) if items.len() == 3 && !items[1].is_array() => {
                return Ok(StructuredFilter::Condition(Condition::try_from(&value)?));
            }
            Some(other) => return Err(AdaptError::UnknownCombinator(other.to_string())),
            None => return Err(AdaptError::BadCondition(value.to_string())),
        };

        let conditions = items[1..]
            .iter()
            .map(Condition::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StructuredFilter::Combined {
            combinator,
            conditions,
        })
    }
}

impl From<StructuredFilter> for Value {
    fn from(filter: StructuredFilter) -> Self {
        match filter {
            StructuredFilter::Condition(condition) => condition.to_json(),
            StructuredFilter::Combined {
                combinator,
                conditions,
            } => {
                let mut items = vec![Value::String(combinator.keyword().to_string())];
                items.extend(conditions.iter().map(Condition::to_json));
                Value::Array(items)
            }
        }
    }
}

/// Render a structured filter as a DSL expression.
///
/// No validation beyond the filter's shape: the result is meant to be passed
/// to [`compile`](super::compile), which reports any grammar problem.
pub fn adapt(filter: &StructuredFilter) -> String {
    match filter {
        StructuredFilter::Condition(condition) => condition.to_string(),
        StructuredFilter::Combined {
            combinator,
            conditions,
        } => conditions
            .iter()
            .map(Condition::to_string)
            .collect::<Vec<_>>()
            .join(combinator.joiner()),
    }
}
