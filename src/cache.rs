//! Memoization of compiled predicates, keyed by expression text.
//!
//! Callers that compile on every keystroke or render pass keep one of these
//! around so an unchanged expression is only compiled once.

use std::collections::HashMap;

use crate::dsl::{FilterError, Predicate, compile};

#[derive(Debug, Default)]
pub struct PredicateCache {
    entries: HashMap<String, Predicate>,
    capacity: Option<usize>,
    hits: u64,
    misses: u64,
}

impl PredicateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` predicates. When full, it is
    /// emptied before the next insert.
    pub fn with_capacity(capacity: usize) -> Self {
        PredicateCache {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Return the cached predicate for `source`, compiling it on a miss.
    /// Failed compilations are not cached.
    pub fn get_or_compile(&mut self, source: &str) -> Result<Predicate, FilterError> {
        if let Some(predicate) = self.entries.get(source) {
            self.hits += 1;
            return Ok(predicate.clone());
        }

        self.misses += 1;
        let predicate = compile(source)?;

        if let Some(capacity) = self.capacity
            && self.entries.len() >= capacity
        {
            tracing::debug!("Predicate cache full ({} entries), clearing", capacity);
            self.entries.clear();
        }
        self.entries.insert(source.to_string(), predicate.clone());
        Ok(predicate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_after_miss() {
        let mut cache = PredicateCache::new();
        let first = cache.get_or_compile("a == 1").unwrap();
        let second = cache.get_or_compile("a == 1").unwrap();

        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(first.source(), second.source());
        assert!(second.matches(&json!({"a": 1})));
    }

    #[test]
    fn test_keyed_on_exact_text() {
        let mut cache = PredicateCache::new();
        cache.get_or_compile("a == 1").unwrap();
        cache.get_or_compile("a==1").unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut cache = PredicateCache::new();
        assert!(cache.get_or_compile("a ==").is_err());
        assert!(cache.get_or_compile("a ==").is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_capacity_clears_when_full() {
        let mut cache = PredicateCache::with_capacity(2);
        cache.get_or_compile("a == 1").unwrap();
        cache.get_or_compile("a == 2").unwrap();
        assert_eq!(cache.len(), 2);

        cache.get_or_compile("a == 3").unwrap();
        assert_eq!(cache.len(), 1);

        cache.get_or_compile("a == 3").unwrap();
        assert_eq!(cache.hits(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
