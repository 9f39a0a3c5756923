//! Helpers for opaque JSON documents.

use serde_json::{Map, Value};

/// Whether a document carries no content: `null`, `{}`, `[]` or `""`.
pub fn is_empty_document(document: &Value) -> bool {
    match document {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Whether `actual` contains everything in `expected`.
///
/// Objects match when every key of `expected` is present in `actual` with a
/// contained value; extra keys in `actual` are ignored. Arrays must have the
/// same length and match element-wise. Scalars must be equal.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| json_contains(a, value))),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual
                    .iter()
                    .zip(expected)
                    .all(|(a, e)| json_contains(a, e))
        }
        (actual, expected) => actual == expected,
    }
}

/// String field of an object document.
pub fn string_field<'a>(document: &'a Value, key: &str) -> Option<&'a str> {
    document
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Copy of an object document with `fields` set, overriding existing keys.
///
/// Non-object documents are replaced by an object holding only `fields`.
pub fn with_fields(document: &Value, fields: &[(&str, Value)]) -> Value {
    let mut map = match document {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in fields {
        map.insert((*key).to_string(), value.clone());
    }
    Value::Object(map)
}
