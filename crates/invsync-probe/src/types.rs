//! Raw document helpers

use serde_json::{Map, Value};

/// Loosely typed probe output: field name to JSON value
pub type RawDocument = Map<String, Value>;

/// Read a field as text, rendering numbers and booleans
#[must_use]
pub fn field_text(doc: &RawDocument, key: &str) -> Option<String> {
    match doc.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read a field as an unsigned integer, parsing numeric text
#[must_use]
pub fn field_u64(doc: &RawDocument, key: &str) -> Option<u64> {
    match doc.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Copy every field of `from` that `into` does not already carry
pub fn merge_missing(into: &mut RawDocument, from: RawDocument) {
    for (key, value) in from {
        into.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_field_text_renders_scalars() {
        let d = doc(json!({"a": "x", "b": 7, "c": true, "d": {"n": 1}}));
        assert_eq!(field_text(&d, "a").as_deref(), Some("x"));
        assert_eq!(field_text(&d, "b").as_deref(), Some("7"));
        assert_eq!(field_text(&d, "c").as_deref(), Some("true"));
        assert_eq!(field_text(&d, "d"), None);
        assert_eq!(field_text(&d, "missing"), None);
    }

    #[test]
    fn test_field_u64_parses_text() {
        let d = doc(json!({"a": "42", "b": 3, "c": "x"}));
        assert_eq!(field_u64(&d, "a"), Some(42));
        assert_eq!(field_u64(&d, "b"), Some(3));
        assert_eq!(field_u64(&d, "c"), None);
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut a = doc(json!({"hostname": "box"}));
        merge_missing(&mut a, doc(json!({"hostname": "other", "os_name": "Debian"})));
        assert_eq!(a["hostname"], "box");
        assert_eq!(a["os_name"], "Debian");
    }
}
