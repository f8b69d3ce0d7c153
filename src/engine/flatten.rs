//! Nested-state flattening — dot-joined paths over JSON objects.
//!
//! Only objects are recursed into; arrays and scalars are leaf values. This
//! keeps e.g. a topic's partition assignment list comparable as a single
//! value instead of exploding into index paths that shift on reordering.

use serde_json::{Map, Value};

/// Flatten a JSON tree into `field_path -> value` pairs.
///
/// `{"a": {"b": {"c": 1}, "d": 2}, "e": 3}` becomes
/// `{"a.b.c": 1, "a.d": 2, "e": 3}`. Non-object input yields a single entry
/// under the empty-prefix rules: a bare scalar at the root flattens to
/// nothing (there is no field to name).
pub fn flatten(tree: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    if let Value::Object(map) = tree {
        flatten_into(map, "", &mut out);
    }
    out
}

fn flatten_into(map: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(nested, &path, out),
            other => out.push((path, other.clone())),
        }
    }
}

/// Look up a flattened path's value.
pub fn get<'a>(flat: &'a [(String, Value)], path: &str) -> Option<&'a Value> {
    flat.iter().find(|(p, _)| p == path).map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_objects() {
        let tree = json!({"a": {"b": {"c": 1}, "d": 2}, "e": 3});
        let flat = flatten(&tree);
        let keys: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a.b.c", "a.d", "e"]);
        assert_eq!(get(&flat, "a.b.c"), Some(&json!(1)));
        assert_eq!(get(&flat, "a.d"), Some(&json!(2)));
        assert_eq!(get(&flat, "e"), Some(&json!(3)));
    }

    #[test]
    fn arrays_are_leaves() {
        let tree = json!({"replicas": [1, 2, 3], "spec": {"ports": [80, 443]}});
        let flat = flatten(&tree);
        assert_eq!(get(&flat, "replicas"), Some(&json!([1, 2, 3])));
        assert_eq!(get(&flat, "spec.ports"), Some(&json!([80, 443])));
    }

    #[test]
    fn non_object_root_is_empty() {
        assert!(flatten(&json!(42)).is_empty());
        assert!(flatten(&json!([1, 2])).is_empty());
        assert!(flatten(&Value::Null).is_empty());
    }

    #[test]
    fn preserves_insertion_order() {
        let tree: Value = serde_json::from_str(r#"{"z": 1, "a": {"y": 2, "b": 3}}"#).unwrap();
        let flat = flatten(&tree);
        let keys: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a.y", "a.b"]);
    }
}
