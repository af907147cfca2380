//! Dot-separated path access into JSON documents.
//!
//! A path such as `foo.bar` names the `bar` field of the `foo` object.
//! Reads distinguish a missing field from an explicit `null`; writes
//! materialise missing intermediate objects.

use serde_json::Value as JsonValue;

/// Read the value at `path`. Returns `None` when any segment is absent
/// or a non-final segment is not an object.
pub fn get_path<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Replace the value at `path`, creating intermediate objects as
/// needed. A non-object encountered along the way is overwritten with
/// an object so the write always lands.
pub fn set_path(root: &mut JsonValue, path: &str, value: JsonValue) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = JsonValue::Object(serde_json::Map::new());
        }
        let map = current.as_object_mut().expect("object ensured above");
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
    }
}

/// Remove the value at `path`, returning it if it was present.
pub fn delete_path(root: &mut JsonValue, path: &str) -> Option<JsonValue> {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let map = current.as_object_mut()?;
        if segments.peek().is_none() {
            return map.remove(segment);
        }
        current = map.get_mut(segment)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_distinguishes_missing_from_null() {
        let doc = json!({"a": {"b": null}});
        assert_eq!(get_path(&doc, "a.b"), Some(&JsonValue::Null));
        assert_eq!(get_path(&doc, "a.c"), None);
    }

    #[test]
    fn set_materialises_intermediates() {
        let mut doc = json!({});
        set_path(&mut doc, "a.b.c", json!(5));
        assert_eq!(doc, json!({"a": {"b": {"c": 5}}}));
    }

    #[test]
    fn set_overwrites_scalar_intermediates() {
        let mut doc = json!({"a": 1});
        set_path(&mut doc, "a.b", json!("x"));
        assert_eq!(doc, json!({"a": {"b": "x"}}));
    }

    #[test]
    fn set_replaces_with_different_type() {
        let mut doc = json!({"foo": {"bar": {"baz": "original"}}});
        set_path(&mut doc, "foo.bar", json!("put me at the root"));
        assert_eq!(doc, json!({"foo": {"bar": "put me at the root"}}));
    }

    #[test]
    fn delete_removes_leaf() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(delete_path(&mut doc, "a.b"), Some(json!(1)));
        assert_eq!(doc, json!({"a": {"c": 2}}));
        assert_eq!(delete_path(&mut doc, "a.b"), None);
    }
}
