//! Response aggregation across the backend history.

use crate::error::GatewayError;
use crate::model::{Body, Header, History};
use serde_json::{Map, Value};

/// Appends every value of `b` to `a`, key by key. Multi-valued merge; no
/// deduplication.
pub fn aggregate_headers(a: &Header, b: &Header) -> Header {
    let mut merged = a.clone();
    for (key, values) in b.iter() {
        for value in values {
            merged = merged.add(key, value);
        }
    }
    merged
}

/// Merges all non-omit JSON response bodies into one object. Collision
/// policy is last-wins per top-level key, unless the backend declares
/// `group_response_as`, which nests its whole body under that key.
pub fn aggregate_bodies(history: &History) -> (Option<Body>, Vec<GatewayError>) {
    let mut merged = Map::new();
    let mut errors = Vec::new();

    for entry in history.non_omit() {
        let Some(body) = entry.response().body() else {
            continue;
        };
        let document = match body.to_json() {
            Ok(document) => document,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        match entry.backend().group_response_as() {
            Some(group_key) => {
                merged.insert(group_key.to_string(), document);
            }
            None => match document {
                Value::Object(map) => {
                    for (key, value) in map {
                        merged.insert(key, value);
                    }
                }
                other => {
                    merged.insert("response".to_string(), other);
                }
            },
        }
    }

    if merged.is_empty() {
        (None, errors)
    } else {
        (Some(Body::json(&Value::Object(merged))), errors)
    }
}

/// Collects all non-omit bodies into a JSON array, history order.
pub fn aggregate_bodies_into_slice(history: &History) -> (Option<Body>, Vec<GatewayError>) {
    let mut items = Vec::new();
    let mut errors = Vec::new();

    for entry in history.non_omit() {
        let Some(body) = entry.response().body() else {
            continue;
        };
        match body.to_json() {
            Ok(document) => items.push(document),
            Err(err) => errors.push(err),
        }
    }

    if items.is_empty() {
        (None, errors)
    } else {
        (Some(Body::json(&Value::Array(items))), errors)
    }
}
