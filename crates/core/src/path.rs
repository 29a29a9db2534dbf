//! Dotted-path access over loosely typed JSON payloads.
//!
//! Upstream responses are walked as plain [`Value`]s so a malformed payload
//! yields `None` instead of an error. Segments index objects by key and
//! arrays by decimal position; an empty path addresses the whole value.

use serde_json::{Map, Value};

/// Marker persisted in place of a projected value that did not resolve.
pub const NOT_FOUND_MARKER: &str = "__pageflow_not_found__";

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

/// Look up the value addressed by `path` inside `value`.
///
/// Returns `None` as soon as a segment is missing, addresses a scalar, or is
/// not a valid array index. An explicit JSON `null` at the path is `Some`.
pub fn get_by_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

/// Build the smallest object that places `value` at `path`.
///
/// `build_by_path(json!(1), "a.b")` is `{"a": {"b": 1}}`. Numeric segments
/// become object keys, which [`get_by_path`] resolves the same way.
pub fn build_by_path(value: Value, path: &str) -> Value {
    let parts: Vec<&str> = segments(path).collect();
    parts.into_iter().rev().fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.to_string(), inner);
        Value::Object(map)
    })
}

/// Shrink `value` down to the sub-value reached by `path`.
///
/// Unresolved paths produce [`NOT_FOUND_MARKER`], so an absent field is
/// remembered rather than fetched again.
pub fn project(value: &Value, path: &str) -> Value {
    match get_by_path(value, path) {
        Some(found) => build_by_path(found.clone(), path),
        None => Value::String(NOT_FOUND_MARKER.to_string()),
    }
}

/// Whether `value` is the persisted not-found marker.
pub fn is_not_found(value: &Value) -> bool {
    value.as_str() == Some(NOT_FOUND_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_object() {
        let value = json!({"data": {"title": "X", "lang": "en"}});
        assert_eq!(get_by_path(&value, "data.title"), Some(&json!("X")));
    }

    #[test]
    fn test_get_array_index() {
        let value = json!({"tracks": [{"id": "a"}, {"id": "b"}]});
        assert_eq!(get_by_path(&value, "tracks.1.id"), Some(&json!("b")));
        assert_eq!(get_by_path(&value, "tracks.2.id"), None);
        assert_eq!(get_by_path(&value, "tracks.first.id"), None);
    }

    #[test]
    fn test_get_through_scalar_is_none() {
        let value = json!({"title": "X"});
        assert_eq!(get_by_path(&value, "title.length"), None);
    }

    #[test]
    fn test_get_distinguishes_null_from_missing() {
        let value = json!({"author": null});
        assert_eq!(get_by_path(&value, "author"), Some(&Value::Null));
        assert_eq!(get_by_path(&value, "publisher"), None);
    }

    #[test]
    fn test_empty_path_is_whole_value() {
        let value = json!({"a": 1});
        assert_eq!(get_by_path(&value, ""), Some(&value));
        assert_eq!(build_by_path(json!(3), ""), json!(3));
    }

    #[test]
    fn test_build_minimal_shape() {
        assert_eq!(build_by_path(json!("X"), "snippet.title"), json!({"snippet": {"title": "X"}}));
    }

    #[test]
    fn test_built_shape_resolves_same_path() {
        let built = build_by_path(json!(["en", "fr"]), "items.0.languages");
        assert_eq!(get_by_path(&built, "items.0.languages"), Some(&json!(["en", "fr"])));
    }

    #[test]
    fn test_project_found_and_missing() {
        let response = json!({"items": [{"snippet": {"title": "X", "description": "long"}}]});
        assert_eq!(project(&response, "items.0.snippet.title"), json!({"items": {"0": {"snippet": {"title": "X"}}}}));

        let missing = project(&response, "items.0.brandingSettings");
        assert!(is_not_found(&missing));
        assert_eq!(get_by_path(&missing, "items.0.brandingSettings"), None);
    }
}
