//! Recursive removal of empty fields from JSON bodies.

use crate::error::GatewayError;
use crate::model::Body;
use serde_json::Value;

/// Removes null, empty-string, empty-array, and empty-object fields
/// recursively. Non-JSON bodies pass through unchanged.
pub fn omit_empty(body: &Body) -> (Body, Vec<GatewayError>) {
    if !body.content_type().is_json() {
        return (body.clone(), Vec::new());
    }
    let document = match body.to_json() {
        Ok(document) => document,
        Err(err) => return (body.clone(), vec![err]),
    };
    let cleaned = clean(document);
    match body.with_json(&cleaned) {
        Ok(new_body) => (new_body, Vec::new()),
        Err(err) => (body.clone(), vec![err]),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Post-order: children are cleaned first, so an object left empty by
/// its children's removal is itself removed.
fn clean(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned = map
                .into_iter()
                .map(|(k, v)| (k, clean(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => {
            let cleaned = items
                .into_iter()
                .map(clean)
                .filter(|v| !is_empty(v))
                .collect();
            Value::Array(cleaned)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_removes_empty_fields_recursively() {
        let body = Body::json(&json!({
            "id": 1,
            "name": "",
            "tags": [],
            "meta": {"note": null},
            "nested": {"keep": "x", "drop": {}}
        }));
        let (cleaned, errors) = omit_empty(&body);
        assert!(errors.is_empty());
        assert_eq!(
            cleaned.to_json().unwrap(),
            json!({"id": 1, "nested": {"keep": "x"}})
        );
    }

    #[test]
    fn test_keeps_false_and_zero() {
        let body = Body::json(&json!({"flag": false, "count": 0}));
        let (cleaned, _) = omit_empty(&body);
        assert_eq!(cleaned.to_json().unwrap(), json!({"flag": false, "count": 0}));
    }

    #[test]
    fn test_non_json_unchanged() {
        let body = Body::text("");
        let (unchanged, errors) = omit_empty(&body);
        assert!(errors.is_empty());
        assert_eq!(unchanged.raw_bytes(), body.raw_bytes());
    }
}
