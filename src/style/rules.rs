//! Style rule definitions and evaluation.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::PredicateCache;
use crate::dsl::{AdaptError, Attributes, Predicate, StructuredFilter, adapt};

/// Rendering attributes attached to features that match a rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Symbolizer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
}

/// A rule filter as written in the style file: DSL text or a structured
/// array filter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum RuleFilter {
    Expression(String),
    Structured(StructuredFilter),
}

impl TryFrom<Value> for RuleFilter {
    type Error = AdaptError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(RuleFilter::Expression(text)),
            other => Ok(RuleFilter::Structured(StructuredFilter::try_from(other)?)),
        }
    }
}

impl From<RuleFilter> for Value {
    fn from(filter: RuleFilter) -> Self {
        match filter {
            RuleFilter::Expression(text) => Value::String(text),
            RuleFilter::Structured(filter) => filter.into(),
        }
    }
}

impl RuleFilter {
    /// The DSL text this filter compiles from.
    pub fn to_expression(&self) -> String {
        match self {
            RuleFilter::Expression(text) => text.clone(),
            RuleFilter::Structured(filter) => adapt(filter),
        }
    }
}

/// Raw style rule from YAML/JSON (before compilation).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Rules without a filter apply to every feature.
    #[serde(default)]
    pub filter: Option<RuleFilter>,
    #[serde(default)]
    pub symbolizer: Symbolizer,
}

/// Raw style from YAML/JSON (before compilation).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StyleConfig {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub default: Option<Symbolizer>,
}

/// A compiled style rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: Option<String>,
    pub predicate: Option<Predicate>,
    pub symbolizer: Symbolizer,
}

impl CompiledRule {
    fn applies<A: Attributes + ?Sized>(&self, attrs: &A) -> bool {
        self.predicate.as_ref().is_none_or(|p| p.matches(attrs))
    }
}

/// A style with compiled rules, in declaration order.
#[derive(Debug, Clone)]
pub struct Style {
    pub rules: Vec<CompiledRule>,
    pub default: Option<Symbolizer>,
}

impl Style {
    /// Compile every rule filter, reusing predicates already in `cache`.
    pub fn compile(config: &StyleConfig, cache: &mut PredicateCache) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.rules.len());

        for (i, rule) in config.rules.iter().enumerate() {
            let predicate = match &rule.filter {
                None => None,
                Some(filter) => {
                    let source = filter.to_expression();
                    let label = rule
                        .name
                        .as_deref()
                        .map(|n| format!(" '{}'", n))
                        .unwrap_or_default();
                    let predicate = cache.get_or_compile(&source).map_err(|e| {
                        anyhow::anyhow!(
                            "Style: Error in rule {}{}: {} (filter: {:?})",
                            i + 1,
                            label,
                            e,
                            source
                        )
                    })?;
                    Some(predicate)
                }
            };

            rules.push(CompiledRule {
                name: rule.name.clone(),
                predicate,
                symbolizer: rule.symbolizer.clone(),
            });
        }

        tracing::debug!(
            "Style: compiled {} rules ({} cached predicates, {} hits)",
            rules.len(),
            cache.len(),
            cache.hits()
        );

        Ok(Style {
            rules,
            default: config.default.clone(),
        })
    }

    /// Index of the rule that styles these attributes: the last rule in
    /// declaration order whose filter matches.
    pub fn rule_index_for<A: Attributes + ?Sized>(&self, attrs: &A) -> Option<usize> {
        self.rules.iter().rposition(|rule| rule.applies(attrs))
    }

    /// Symbolizer for these attributes, falling back to the style default.
    pub fn symbolizer_for<A: Attributes + ?Sized>(&self, attrs: &A) -> Option<&Symbolizer> {
        match self.rule_index_for(attrs) {
            Some(i) => Some(&self.rules[i].symbolizer),
            None => self.default.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fill(color: &str) -> Symbolizer {
        Symbolizer {
            fill: Some(color.into()),
            ..Symbolizer::default()
        }
    }

    fn rule(filter: Option<RuleFilter>, color: &str) -> RuleConfig {
        RuleConfig {
            name: Some(color.into()),
            filter,
            symbolizer: fill(color),
        }
    }

    fn expression(text: &str) -> Option<RuleFilter> {
        Some(RuleFilter::Expression(text.into()))
    }

    fn make_style() -> Style {
        let config = StyleConfig {
            rules: vec![
                rule(None, "grey"),
                rule(expression("kind == \"park\""), "green"),
                rule(expression("kind == \"park\" and area > 1000"), "darkgreen"),
                rule(
                    Some(RuleFilter::Structured(
                        serde_json::from_value(json!(["any", ["==", "water", 1], ["like", "name", "\"lake\""]]))
                            .unwrap(),
                    )),
                    "blue",
                ),
            ],
            default: None,
        };

        Style::compile(&config, &mut PredicateCache::new()).unwrap()
    }

    #[test]
    fn test_last_matching_rule_wins() {
        let style = make_style();

        assert_eq!(
            style.symbolizer_for(&json!({"kind": "park", "area": 5000})),
            Some(&fill("darkgreen"))
        );
        assert_eq!(
            style.symbolizer_for(&json!({"kind": "park", "area": 10})),
            Some(&fill("green"))
        );
    }

    #[test]
    fn test_later_rule_overrides_earlier_match() {
        let style = make_style();

        // Matches "green", "darkgreen" and "blue"; the last one declared wins
        let attrs = json!({"kind": "park", "area": 5000, "name": "Lakeside"});
        assert_eq!(style.rule_index_for(&attrs), Some(3));
        assert_eq!(style.symbolizer_for(&attrs), Some(&fill("blue")));
    }

    #[test]
    fn test_unfiltered_rule_catches_everything() {
        let style = make_style();
        assert_eq!(style.rule_index_for(&json!({"kind": "road"})), Some(0));
        assert_eq!(style.symbolizer_for(&json!({})), Some(&fill("grey")));
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let config = StyleConfig {
            rules: vec![rule(expression("kind == \"park\""), "green")],
            default: Some(fill("white")),
        };
        let style = Style::compile(&config, &mut PredicateCache::new()).unwrap();

        assert_eq!(style.rule_index_for(&json!({"kind": "road"})), None);
        assert_eq!(style.symbolizer_for(&json!({"kind": "road"})), Some(&fill("white")));

        let no_default = StyleConfig {
            default: None,
            ..config
        };
        let style = Style::compile(&no_default, &mut PredicateCache::new()).unwrap();
        assert_eq!(style.symbolizer_for(&json!({"kind": "road"})), None);
    }

    #[test]
    fn test_compile_error_names_the_rule() {
        let config = StyleConfig {
            rules: vec![
                rule(expression("kind == \"park\""), "green"),
                rule(expression("kind =="), "broken"),
            ],
            default: None,
        };

        let err = Style::compile(&config, &mut PredicateCache::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("rule 2 'broken'"), "{message}");
        assert!(message.contains("parse error"), "{message}");
    }

    #[test]
    fn test_shared_expressions_compile_once() {
        let config = StyleConfig {
            rules: vec![
                rule(expression("a == 1"), "one"),
                rule(expression("a == 1"), "two"),
                rule(
                    Some(RuleFilter::Structured(
                        serde_json::from_value(json!(["==", "a", 1])).unwrap(),
                    )),
                    "three",
                ),
            ],
            default: None,
        };
        let mut cache = PredicateCache::new();
        Style::compile(&config, &mut cache).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn test_rule_filter_deserializes_both_forms() {
        let rules: Vec<RuleConfig> = serde_json::from_value(json!([
            {"filter": "a == 1", "symbolizer": {"fill": "red"}},
            {"filter": ["all", ["==", "a", 1], [">", "b", 2]]},
            {"name": "fallback", "symbolizer": {"stroke": "black", "stroke_width": 0.5}}
        ]))
        .unwrap();

        assert_eq!(rules[0].filter, expression("a == 1"));
        assert_eq!(
            rules[1].filter.as_ref().map(RuleFilter::to_expression),
            Some("a == 1 and b > 2".to_string())
        );
        assert!(rules[2].filter.is_none());
        assert_eq!(rules[2].symbolizer.stroke_width, Some(0.5));
    }

    #[test]
    fn test_malformed_structured_filter_keeps_detail() {
        let err = serde_json::from_value::<RuleConfig>(json!({
            "filter": ["all", ["==", "a"]]
        }))
        .unwrap_err();
        assert!(
            err.to_string().contains("condition must be [operator, property, value]"),
            "{err}"
        );

        let err = serde_json::from_value::<RuleConfig>(json!({
            "filter": ["every", ["==", "a", 1], ["==", "b", 2]]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown combinator 'every'"), "{err}");

        let err = serde_json::from_value::<RuleConfig>(json!({"filter": 5})).unwrap_err();
        assert!(err.to_string().contains("must be an array"), "{err}");
    }

    #[test]
    fn test_rule_filter_serializes_as_written() {
        let filter = RuleFilter::try_from(json!(["any", ["==", "a", 1]])).unwrap();
        assert_eq!(serde_json::to_value(&filter).unwrap(), json!(["any", ["==", "a", 1]]));
        assert_eq!(
            serde_json::to_value(RuleFilter::Expression("a == 1".into())).unwrap(),
            json!("a == 1")
        );
    }

    #[test]
    fn test_symbolizer_serializes_only_set_fields() {
        let value = serde_json::to_value(fill("red")).unwrap();
        assert_eq!(value, json!({"fill": "red"}));
    }
}
