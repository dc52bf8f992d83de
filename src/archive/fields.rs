//! Typed access to the keys of one JSON object.
//!
//! The loader pops every key it understands; whatever is left over is
//! reported as ignored.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Short JSON type name for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Keys of one panel, entry or top-level object.
#[derive(Debug)]
pub(crate) struct Fields {
    map: Map<String, Value>,
    location: &'static str,
}

impl Fields {
    /// Wrap an object; `location` is appended to the key in messages,
    /// e.g. `" in entry"`.
    pub(crate) fn new(map: Map<String, Value>, location: &'static str) -> Self {
        Self { map, location }
    }

    /// Wrap a value that must be an object.
    pub(crate) fn from_value(
        value: Value,
        key: &str,
        location: &'static str,
    ) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map, location)),
            other => Err(Error::TypeMismatch {
                key: key.to_string(),
                location: String::new(),
                expected: "an object",
                got: json_type_name(&other),
            }),
        }
    }

    fn mismatch(&self, key: &str, expected: &'static str, got: &Value) -> Error {
        Error::TypeMismatch {
            key: key.to_string(),
            location: self.location.to_string(),
            expected,
            got: json_type_name(got),
        }
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub(crate) fn take_str(&mut self, key: &str) -> Result<Option<String>> {
        match self.map.remove(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.mismatch(key, "a string", &other)),
        }
    }

    /// A required string key.
    pub(crate) fn require_str(&mut self, key: &'static str, context: &'static str) -> Result<String> {
        self.take_str(key)?.ok_or(Error::MissingField {
            context,
            field: key,
        })
    }

    /// A string key that may also be `null`; `null` reads as absent.
    pub(crate) fn take_str_or_null(&mut self, key: &str) -> Result<Option<String>> {
        match self.map.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.mismatch(key, "a string or null", &other)),
        }
    }

    pub(crate) fn take_bool(&mut self, key: &str) -> Result<Option<bool>> {
        match self.map.remove(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(self.mismatch(key, "a boolean", &other)),
        }
    }

    pub(crate) fn take_str_list(&mut self, key: &str) -> Result<Option<Vec<String>>> {
        match self.map.remove(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(self.mismatch(key, "a list of strings", &other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.mismatch(key, "a list of strings", &other)),
        }
    }

    /// A list of objects, e.g. `entries`.
    pub(crate) fn take_object_list(&mut self, key: &str) -> Result<Option<Vec<Map<String, Value>>>> {
        match self.map.remove(key) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(self.mismatch(key, "a list of objects", &other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.mismatch(key, "a list of objects", &other)),
        }
    }

    /// A string, or a list of strings concatenated.
    pub(crate) fn take_text(&mut self, key: &str) -> Result<Option<String>> {
        match self.map.remove(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Array(items)) => {
                let mut text = String::new();
                for item in &items {
                    match item {
                        Value::String(s) => text.push_str(s),
                        other => {
                            return Err(self.mismatch(key, "a string or a list of strings", other));
                        }
                    }
                }
                Ok(Some(text))
            }
            Some(other) => Err(self.mismatch(key, "a string or a list of strings", &other)),
        }
    }

    /// Sorted names of the keys nobody took.
    pub(crate) fn remaining_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn into_map(self) -> Map<String, Value> {
        self.map
    }

    pub(crate) fn map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.map
    }
}

/// "ignored panel keys: a, b" style message.
pub(crate) fn ignored_keys_message(what: &str, keys: &[String]) -> String {
    let plural = if keys.len() == 1 { "" } else { "s" };
    format!("ignored {what} key{plural}: {}", keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        Fields::from_value(value, "entry", " in entry").unwrap()
    }

    #[test]
    fn test_take_and_remaining() {
        let mut f = fields(json!({"time": "10:00", "zzz": 1, "aaa": 2}));
        assert_eq!(f.take_str("time").unwrap().as_deref(), Some("10:00"));
        assert_eq!(f.take_str("time").unwrap(), None);
        assert_eq!(f.remaining_keys(), vec!["aaa", "zzz"]);
        assert_eq!(
            ignored_keys_message("entry", &f.remaining_keys()),
            "ignored entry keys: aaa, zzz"
        );
    }

    #[test]
    fn test_type_mismatch_message() {
        let mut f = fields(json!({"insight": "yes"}));
        let err = f.take_bool("insight").unwrap_err();
        assert_eq!(err.to_string(), "\"insight\" in entry: expected a boolean, got string");
    }

    #[test]
    fn test_text_concatenation() {
        let mut f = fields(json!({"data": ["Hello, ", "world"], "bad": ["a", 1]}));
        assert_eq!(f.take_text("data").unwrap().as_deref(), Some("Hello, world"));
        assert!(f.take_text("bad").is_err());
    }

    #[test]
    fn test_required_and_nullable() {
        let mut f = fields(json!({"rating": null}));
        assert_eq!(f.take_str_or_null("rating").unwrap(), None);
        let err = f.require_str("date", "panel").unwrap_err();
        assert_eq!(err.to_string(), "panel must provide date");
    }

    #[test]
    fn test_non_object_rejected() {
        let err = Fields::from_value(json!([1]), "data", "").unwrap_err();
        assert_eq!(err.to_string(), "\"data\": expected an object, got list");
    }
}
