//! Defensive accessors over nested API documents. A missing key at any level,
//! or a value of the wrong shape, reads as absent.

use serde_json::Value;

static NULL: Value = Value::Null;

/// The `protocolSection` of a study document, or null when absent.
pub fn protocol(study: &Value) -> &Value {
    at(study, &["protocolSection"]).unwrap_or(&NULL)
}

/// Walk object keys. Stops at the first missing key or non-object.
pub fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |cur, key| cur.as_object()?.get(*key))
}

/// Scalar at `path` as text. Numbers and booleans use their JSON rendering;
/// null, arrays and objects read as absent.
pub fn text_at(value: &Value, path: &[&str]) -> Option<String> {
    at(value, path).and_then(scalar_text)
}

pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Array of scalars at `path`, skipping non-scalar elements.
pub fn list_at(value: &Value, path: &[&str]) -> Vec<String> {
    items_at(value, path).iter().filter_map(scalar_text).collect()
}

/// Array at `path`, or an empty slice.
pub fn items_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    at(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_parents_read_as_absent() {
        let v = json!({"a": {"b": 1}});
        assert_eq!(text_at(&v, &["a", "b"]).as_deref(), Some("1"));
        assert_eq!(text_at(&v, &["a", "x", "y"]), None);
        assert_eq!(text_at(&v, &["a", "b", "c"]), None);
        assert!(list_at(&v, &["nope"]).is_empty());
    }

    #[test]
    fn scalars_render_as_json_text() {
        let v = json!({"n": 120, "t": true, "z": null, "o": {}});
        assert_eq!(text_at(&v, &["n"]).as_deref(), Some("120"));
        assert_eq!(text_at(&v, &["t"]).as_deref(), Some("true"));
        assert_eq!(text_at(&v, &["z"]), None);
        assert_eq!(text_at(&v, &["o"]), None);
    }

    #[test]
    fn wrong_shape_lists_are_empty() {
        let v = json!({"l": "not a list", "m": ["x", 2, {"k": 1}, null]});
        assert!(list_at(&v, &["l"]).is_empty());
        assert_eq!(list_at(&v, &["m"]), vec!["x", "2"]);
    }
}
