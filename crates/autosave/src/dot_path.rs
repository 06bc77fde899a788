//! Dot-path helpers: `"claimantInfo.firstName"` addresses `{"claimantInfo": {"firstName": ..}}`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::AutoSaveError;

/// Rejects paths that cannot address a field: empty, or with an empty segment.
pub fn validate_path(path: &str) -> Result<(), AutoSaveError> {
    if path.is_empty() {
        return Err(AutoSaveError::InvalidPath {
            path: path.to_string(),
            reason: "path is empty",
        });
    }
    if path.split('.').any(str::is_empty) {
        return Err(AutoSaveError::InvalidPath {
            path: path.to_string(),
            reason: "path contains an empty segment",
        });
    }
    Ok(())
}

/// Expands a flat map of dotted keys into a nested object.
///
/// Sibling keys under one prefix are merged. Keys are applied in map order
/// (lexicographic), so when both `"a"` and `"a.b"` are present the deeper
/// path wins and the scalar at `"a"` is replaced by an object.
pub fn expand_dot_paths(entries: &BTreeMap<String, Value>) -> Value {
    let mut root = Map::new();
    for (path, value) in entries {
        insert_path(&mut root, path, value.clone());
    }
    Value::Object(root)
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut node = root;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            node.insert(segment.to_string(), value);
            return;
        }

        let slot = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(child) => node = child,
            _ => return,
        }
    }
}

/// Inverse of [`expand_dot_paths`]: nested objects become dotted keys.
///
/// Arrays, scalars and empty objects are leaves. A non-object `value` is
/// stored under `prefix` itself.
pub fn flatten_value(prefix: &str, value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(prefix, value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&path, child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_siblings_merge_under_shared_prefix() {
        let flat = entries(&[
            ("claimantInfo.firstName", json!("John")),
            ("claimantInfo.lastName", json!("Doe")),
        ]);

        assert_eq!(
            expand_dot_paths(&flat),
            json!({"claimantInfo": {"firstName": "John", "lastName": "Doe"}})
        );
    }

    #[test]
    fn test_deep_and_shallow_paths_mix() {
        let flat = entries(&[
            ("vehicle.damage.front.severity", json!(3)),
            ("vehicle.damage.rear", json!(null)),
            ("vehicle.vin", json!("WVW123")),
            ("notes", json!(["a", "b"])),
        ]);

        assert_eq!(
            expand_dot_paths(&flat),
            json!({
                "notes": ["a", "b"],
                "vehicle": {
                    "damage": {"front": {"severity": 3}, "rear": null},
                    "vin": "WVW123"
                }
            })
        );
    }

    #[test]
    fn test_deeper_path_replaces_scalar_parent() {
        let flat = entries(&[("a", json!(1)), ("a.b", json!(2))]);
        assert_eq!(expand_dot_paths(&flat), json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_object_value_merges_with_child_path() {
        let flat = entries(&[("a", json!({"x": 1})), ("a.y", json!(2))]);
        assert_eq!(expand_dot_paths(&flat), json!({"a": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_empty_map_expands_to_empty_object() {
        assert_eq!(expand_dot_paths(&BTreeMap::new()), json!({}));
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("amount").is_ok());
        assert!(validate_path("claimantInfo.address.zip").is_ok());

        for bad in ["", ".a", "a.", "a..b", "."] {
            assert!(
                matches!(validate_path(bad), Err(AutoSaveError::InvalidPath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_flatten_is_inverse_of_expand() {
        let nested = json!({
            "claimantInfo": {"firstName": "John", "phones": ["1", "2"]},
            "fees": {"base": 120.5, "extras": {}},
            "locked": false
        });

        let flat = flatten_value("", &nested);
        assert_eq!(flat.get("claimantInfo.firstName"), Some(&json!("John")));
        assert_eq!(flat.get("fees.extras"), Some(&json!({})));
        assert_eq!(flat.len(), 5);
        assert_eq!(expand_dot_paths(&flat), nested);
    }

    #[test]
    fn test_flatten_with_prefix() {
        let flat = flatten_value("claimantInfo", &json!({"firstName": "Jane"}));
        assert_eq!(flat.get("claimantInfo.firstName"), Some(&json!("Jane")));

        let scalar = flatten_value("amount", &json!(10));
        assert_eq!(scalar.get("amount"), Some(&json!(10)));
    }
}
