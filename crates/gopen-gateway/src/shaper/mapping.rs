//! Body field renames.

use crate::error::GatewayError;
use crate::jsonpath;
use crate::model::Body;
use std::collections::HashMap;

/// Renames fields `from → to`; both sides are JSONPaths. Missing source
/// paths are skipped.
pub fn map_fields(body: &Body, mapping: &HashMap<String, String>) -> (Body, Vec<GatewayError>) {
    if mapping.is_empty() || !body.content_type().is_json() {
        return (body.clone(), Vec::new());
    }
    let mut document = match body.to_json() {
        Ok(document) => document,
        Err(err) => return (body.clone(), vec![err]),
    };

    for (from, to) in mapping {
        let Some(value) = jsonpath::get(&document, from).value().cloned() else {
            continue;
        };
        document = jsonpath::delete(document, from);
        document = jsonpath::set(document, to, value);
    }

    match body.with_json(&document) {
        Ok(new_body) => (new_body, Vec::new()),
        Err(err) => (body.clone(), vec![err]),
    }
}
