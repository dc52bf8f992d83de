//! Open-ended attribute storage shared by panels and entries.
//!
//! Attributes are arbitrary JSON values keyed by name. Insertion order
//! carries no meaning, so a sorted map keeps comparisons and output stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named attribute map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Get a string attribute; `None` if missing or not a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.get_mut(name)
    }

    /// Set an attribute, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Remove an attribute, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge every pair of `other` into this map, overwriting existing names.
    pub fn extend<I, K>(&mut self, other: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (name, value) in other {
            self.0.insert(name.into(), value);
        }
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let mut attrs = Attributes::new();
        assert!(attrs.is_empty());

        assert_eq!(attrs.set("question", "How was today?"), None);
        assert_eq!(attrs.get_str("question"), Some("How was today?"));
        assert!(attrs.contains("question"));

        let old = attrs.set("question", json!(42));
        assert_eq!(old, Some(json!("How was today?")));
        assert_eq!(attrs.get_str("question"), None);

        assert_eq!(attrs.remove("question"), Some(json!(42)));
        assert!(!attrs.contains("question"));
        assert_eq!(attrs.remove("question"), None);
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let mut a = Attributes::new();
        a.set("x", 1);
        a.set("y", 2);
        let mut b = Attributes::new();
        b.set("y", 2);
        b.set("x", 1);
        assert_eq!(a, b);
        assert_eq!(a.names().collect::<Vec<_>>(), vec!["x", "y"]);
    }
}
