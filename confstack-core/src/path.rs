//! Dot-path access into `serde_json::Value` trees.
//!
//! A path like `"database.host"` addresses nested object fields. Lookups on a
//! missing or non-object intermediate yield `None`, never an error.

use serde_json::{Map, Value};

pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = root;
    for segment in path.split('.') {
        let object = cursor.as_object()?;
        cursor = object.get(segment)?;
    }
    Some(cursor)
}

/// Writes `value` at `path`, creating intermediate objects as needed.
/// Non-object intermediates are replaced by empty objects.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    let segments: Vec<&str> = path.split('.').collect();
    let object = root.as_object_mut().expect("root must be an object");
    set_in_object(object, &segments, value);
}

fn set_in_object(object: &mut Map<String, Value>, segments: &[&str], value: Value) {
    if segments.is_empty() {
        return;
    }
    let segment = segments[0];
    if segments.len() == 1 {
        object.insert(segment.to_owned(), value);
        return;
    }

    let entry = object
        .entry(segment.to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    let child = entry.as_object_mut().expect("entry must be object");
    set_in_object(child, &segments[1..], value);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{get_path, set_path};

    #[test]
    fn traverses_nested_objects() {
        let root = json!({"a": {"b": {"c": 42}}});
        assert_eq!(get_path(&root, "a.b.c"), Some(&json!(42)));
    }

    #[test]
    fn missing_intermediate_yields_none() {
        let root = json!({"a": {"b": {}}});
        assert_eq!(get_path(&root, "a.b.c"), None);
    }

    #[test]
    fn non_object_intermediate_yields_none() {
        let root = json!({"a": {"b": "scalar"}});
        assert_eq!(get_path(&root, "a.b.c"), None);
    }

    #[test]
    fn null_leaf_is_a_defined_value() {
        let root = json!({"a": null});
        assert_eq!(get_path(&root, "a"), Some(&json!(null)));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = json!({});
        set_path(&mut root, "database.pool.size", json!(10));
        assert_eq!(root, json!({"database": {"pool": {"size": 10}}}));
    }

    #[test]
    fn set_replaces_non_object_intermediates() {
        let mut root = json!({"database": "sqlite"});
        set_path(&mut root, "database.host", json!("localhost"));
        assert_eq!(root, json!({"database": {"host": "localhost"}}));
    }
}
