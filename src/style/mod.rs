//! Cartographic style rules.
//!
//! A style is an ordered list of rules, each carrying an optional filter and a
//! symbolizer. Later rules take priority: rules are scanned from last to
//! first and the first match wins.

mod rules;

pub use rules::{CompiledRule, RuleConfig, RuleFilter, Style, StyleConfig, Symbolizer};
