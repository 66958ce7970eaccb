//! Body projection: keep or drop fields by JSONPath.

use crate::config::Projection;
use crate::error::GatewayError;
use crate::jsonpath;
use crate::model::Body;
use serde_json::Value;

/// Include mode builds a new document from the listed paths; exclude
/// mode deletes them. Modes are mutually exclusive (config-validated).
pub fn project(body: &Body, projection: &Projection) -> (Body, Vec<GatewayError>) {
    if !body.content_type().is_json() {
        return (body.clone(), Vec::new());
    }
    let document = match body.to_json() {
        Ok(document) => document,
        Err(err) => return (body.clone(), vec![err]),
    };

    let projected = if projection.is_include() {
        let mut kept = Value::Object(serde_json::Map::new());
        for path in projection.paths() {
            let found = jsonpath::get(&document, path);
            if let Some(value) = found.value() {
                kept = jsonpath::set(kept, path, value.clone());
            }
        }
        kept
    } else {
        let mut remaining = document;
        for path in projection.paths() {
            remaining = jsonpath::delete(remaining, path);
        }
        remaining
    };

    match body.with_json(&projected) {
        Ok(new_body) => (new_body, Vec::new()),
        Err(err) => (body.clone(), vec![err]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Body {
        Body::json(&json!({"id": 1, "name": "a", "secret": "s", "meta": {"k": 1, "drop": 2}}))
    }

    #[test]
    fn test_include_mode() {
        let projection = Projection::from_entries(vec![("id", 1), ("meta.k", 1)]);
        let (projected, errors) = project(&body(), &projection);
        assert!(errors.is_empty());
        assert_eq!(projected.to_json().unwrap(), json!({"id": 1, "meta": {"k": 1}}));
    }

    #[test]
    fn test_exclude_mode() {
        let projection = Projection::from_entries(vec![("secret", 0), ("meta.drop", 0)]);
        let (projected, _) = project(&body(), &projection);
        assert_eq!(
            projected.to_json().unwrap(),
            json!({"id": 1, "name": "a", "meta": {"k": 1}})
        );
    }

    #[test]
    fn test_include_missing_path_is_skipped() {
        let projection = Projection::from_entries(vec![("id", 1), ("nope", 1)]);
        let (projected, _) = project(&body(), &projection);
        assert_eq!(projected.to_json().unwrap(), json!({"id": 1}));
    }
}
