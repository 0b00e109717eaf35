//! Nested-structure flattening.

use serde_json::{Map, Value};

use crate::record::{FieldValue, Record};

/// Default separator between key segments.
pub const DEFAULT_SEPARATOR: &str = "_";

/// Flattens a nested JSON object into a single-level [`Record`].
///
/// Keys are joined with `sep`; a non-empty `prefix` is prepended to every
/// key. Arrays and scalars are leaves. An empty nested object contributes
/// nothing, and a non-object root yields an empty record.
#[must_use]
pub fn flatten(value: &Value, prefix: &str, sep: &str) -> Record {
    let mut out = Record::new();
    if let Value::Object(map) = value {
        flatten_into(&mut out, map, prefix, sep);
    }
    out
}

/// [`flatten`] with the default `_` separator.
#[must_use]
pub fn flatten_default(value: &Value, prefix: &str) -> Record {
    flatten(value, prefix, DEFAULT_SEPARATOR)
}

fn flatten_into(out: &mut Record, map: &Map<String, Value>, prefix: &str, sep: &str) {
    for (key, value) in map {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{sep}{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(out, inner, &full_key, sep),
            leaf => out.insert(full_key, FieldValue::from_json(leaf)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_in_order() {
        let flat = flatten_default(&json!({"a": {"b": 1, "c": 2}}), "");
        let pairs: Vec<_> = flat.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assert_eq!(
            pairs,
            vec![
                ("a_b".to_string(), FieldValue::Integer(1)),
                ("a_c".to_string(), FieldValue::Integer(2)),
            ]
        );
    }

    #[test]
    fn test_flatten_is_idempotent_on_flat_input() {
        let input = json!({"id": "o1", "state": "PENDING", "total": 12.5});
        let flat = flatten_default(&input, "");
        assert_eq!(flat, Record::from_json_object(&input));
    }

    #[test]
    fn test_flatten_with_prefix() {
        let flat = flatten_default(
            &json!({"city": "C-1", "geo": {"lat": 1.5, "lng": 2.5}}),
            "ship",
        );
        assert_eq!(
            flat.keys().collect::<Vec<_>>(),
            vec!["ship_city", "ship_geo_lat", "ship_geo_lng"]
        );
    }

    #[test]
    fn test_flatten_keeps_arrays_as_leaves() {
        let flat = flatten_default(&json!({"tags": ["a", "b"], "empty": {}}), "");
        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("tags"), Some(&FieldValue::Json(json!(["a", "b"]))));
    }

    #[test]
    fn test_flatten_non_object_root() {
        assert!(flatten_default(&json!(null), "ship").is_empty());
        assert!(flatten_default(&json!([1, 2]), "").is_empty());
        assert!(flatten_default(&json!("x"), "").is_empty());
    }

    #[test]
    fn test_flatten_custom_separator() {
        let flat = flatten(&json!({"a": {"b": true}}), "p", ".");
        assert_eq!(flat.get("p.a.b"), Some(&FieldValue::Boolean(true)));
    }
}
