//! Declarative modifier application.
//!
//! A modifier `(context, scope, action, key, value)` mutates one field of
//! the templated backend request or the shaped backend response. Values
//! pass through the dynamic-value resolver first, so they can reference
//! the live request and earlier backend responses.

use crate::config::{Modifier, ModifierAction, ModifierContext, ModifierScope};
use crate::dynamic;
use crate::error::GatewayError;
use crate::jsonpath;
use crate::model::{BackendRequest, BackendResponse, Body, History, HttpRequest};
use serde_json::Value;

pub fn apply_request_modifiers(
    mut backend_request: BackendRequest,
    modifiers: &[Modifier],
    inbound: &HttpRequest,
    history: &History,
) -> (BackendRequest, Vec<GatewayError>) {
    let mut errors = Vec::new();
    for modifier in modifiers {
        if modifier.context != ModifierContext::Request {
            continue;
        }
        let (value, mut resolve_errors) = dynamic::resolve(&modifier.value, inbound, history);
        errors.append(&mut resolve_errors);

        match modifier.scope {
            ModifierScope::Header => {
                let header = apply_to_map(
                    backend_request.header().clone(),
                    modifier.action,
                    &modifier.key,
                    &value,
                    MapOps::header(),
                );
                backend_request = backend_request.with_header(header);
            }
            ModifierScope::Query => {
                let query = apply_to_map(
                    backend_request.query().clone(),
                    modifier.action,
                    &modifier.key,
                    &value,
                    MapOps::query(),
                );
                backend_request = backend_request.with_query(query);
            }
            ModifierScope::Param => {
                let path = match modifier.action {
                    ModifierAction::Delete => backend_request.path().del_param(&modifier.key),
                    ModifierAction::Replace => {
                        backend_request.path().replace_param(&modifier.key, &value)
                    }
                    _ => backend_request.path().set_param(&modifier.key, &value),
                };
                backend_request = backend_request.with_path(path);
            }
            ModifierScope::Body => {
                let (body, mut body_errors) = apply_to_body(
                    backend_request.body().cloned(),
                    modifier.action,
                    &modifier.key,
                    &value,
                );
                errors.append(&mut body_errors);
                backend_request = backend_request.with_body(body);
            }
        }
    }
    (backend_request, errors)
}

pub fn apply_response_modifiers(
    mut response: BackendResponse,
    modifiers: &[Modifier],
    inbound: &HttpRequest,
    history: &History,
) -> (BackendResponse, Vec<GatewayError>) {
    let mut errors = Vec::new();
    for modifier in modifiers {
        if modifier.context != ModifierContext::Response {
            continue;
        }
        let (value, mut resolve_errors) = dynamic::resolve(&modifier.value, inbound, history);
        errors.append(&mut resolve_errors);

        match modifier.scope {
            ModifierScope::Header => {
                let header = apply_to_map(
                    response.header().clone(),
                    modifier.action,
                    &modifier.key,
                    &value,
                    MapOps::header(),
                );
                response = response.with_header(header);
            }
            ModifierScope::Body => {
                let (body, mut body_errors) = apply_to_body(
                    response.body().cloned(),
                    modifier.action,
                    &modifier.key,
                    &value,
                );
                errors.append(&mut body_errors);
                response = response.with_body(body);
            }
            // Query and param scopes have no meaning on a response.
            ModifierScope::Query | ModifierScope::Param => {}
        }
    }
    (response, errors)
}

/// Header and Query share the same mutator surface; this indirection
/// keeps one action dispatcher for both.
struct MapOps<T> {
    add: fn(&T, &str, &str) -> T,
    append: fn(&T, &str, &str) -> T,
    set: fn(&T, &str, &str) -> T,
    replace: fn(&T, &str, &str) -> T,
    del: fn(&T, &str) -> T,
}

impl MapOps<crate::model::Header> {
    fn header() -> Self {
        use crate::model::Header;
        Self {
            add: Header::add,
            append: Header::append,
            set: Header::set,
            replace: Header::replace,
            del: Header::del,
        }
    }
}

impl MapOps<crate::model::Query> {
    fn query() -> Self {
        use crate::model::Query;
        Self {
            add: Query::add,
            append: Query::append,
            set: Query::set,
            replace: Query::replace,
            del: Query::del,
        }
    }
}

fn apply_to_map<T>(target: T, action: ModifierAction, key: &str, value: &str, ops: MapOps<T>) -> T {
    match action {
        ModifierAction::Add => (ops.add)(&target, key, value),
        ModifierAction::Append => (ops.append)(&target, key, value),
        ModifierAction::Set => (ops.set)(&target, key, value),
        ModifierAction::Replace => (ops.replace)(&target, key, value),
        ModifierAction::Delete => (ops.del)(&target, key),
    }
}

fn apply_to_body(
    body: Option<Body>,
    action: ModifierAction,
    path: &str,
    value: &str,
) -> (Option<Body>, Vec<GatewayError>) {
    let Some(body) = body else {
        return (None, Vec::new());
    };
    if !body.content_type().is_json() {
        return (Some(body), Vec::new());
    }
    let document = match body.to_json() {
        Ok(document) => document,
        Err(err) => return (Some(body), vec![err]),
    };
    // Modifier values that parse as JSON are inserted structurally.
    let parsed: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let existing = jsonpath::get(&document, path).value().cloned();
    let updated = match action {
        ModifierAction::Add => match existing {
            Some(Value::Array(mut items)) => {
                items.push(parsed);
                jsonpath::set(document, path, Value::Array(items))
            }
            _ => jsonpath::set(document, path, parsed),
        },
        ModifierAction::Append => match existing {
            Some(Value::Array(mut items)) => {
                items.push(parsed);
                jsonpath::set(document, path, Value::Array(items))
            }
            Some(current) => jsonpath::set(document, path, Value::Array(vec![current, parsed])),
            None => document,
        },
        ModifierAction::Set => jsonpath::set(document, path, parsed),
        ModifierAction::Replace => match existing {
            Some(_) => jsonpath::set(document, path, parsed),
            None => document,
        },
        ModifierAction::Delete => jsonpath::delete(document, path),
    };

    match body.with_json(&updated) {
        Ok(new_body) => (Some(new_body), Vec::new()),
        Err(err) => (Some(body), vec![err]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Header, Query, UrlPath};
    use serde_json::json;

    fn modifier(
        context: ModifierContext,
        scope: ModifierScope,
        action: ModifierAction,
        key: &str,
        value: &str,
    ) -> Modifier {
        Modifier {
            context,
            scope,
            action,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn inbound() -> HttpRequest {
        HttpRequest::new(
            UrlPath::new("/u/:id", vec![("id".to_string(), "42".to_string())]),
            "/u/42".to_string(),
            "POST".to_string(),
            Header::new(),
            Query::new(),
            Some(Body::json(&json!({"userId": "u-7"}))),
        )
    }

    fn backend_request() -> BackendRequest {
        BackendRequest::new(
            "http://svc".to_string(),
            UrlPath::new("/users/:id", vec![("id".to_string(), "42".to_string())]),
            "GET".to_string(),
            Header::new().add("X-Keep", "1"),
            Query::new().add("q", "a"),
            Some(Body::json(&json!({"tags": ["x"]}))),
        )
    }

    #[test]
    fn test_header_set_with_dynamic_value() {
        let modifiers = [modifier(
            ModifierContext::Request,
            ModifierScope::Header,
            ModifierAction::Set,
            "X-User",
            "#request.body.userId",
        )];
        let (templated, errors) =
            apply_request_modifiers(backend_request(), &modifiers, &inbound(), &History::new());
        assert!(errors.is_empty());
        assert_eq!(templated.header().get_first("X-User"), Some("u-7"));
    }

    #[test]
    fn test_query_and_param_actions() {
        let modifiers = [
            modifier(ModifierContext::Request, ModifierScope::Query, ModifierAction::Delete, "q", ""),
            modifier(ModifierContext::Request, ModifierScope::Param, ModifierAction::Set, "id", "99"),
        ];
        let (templated, _) =
            apply_request_modifiers(backend_request(), &modifiers, &inbound(), &History::new());
        assert!(!templated.query().exists("q"));
        assert_eq!(templated.path().rendered(), "/users/99");
    }

    #[test]
    fn test_body_add_appends_to_array() {
        let modifiers = [modifier(
            ModifierContext::Request,
            ModifierScope::Body,
            ModifierAction::Add,
            "tags",
            "y",
        )];
        let (templated, _) =
            apply_request_modifiers(backend_request(), &modifiers, &inbound(), &History::new());
        assert_eq!(
            templated.body().unwrap().to_json().unwrap(),
            json!({"tags": ["x", "y"]})
        );
    }

    #[test]
    fn test_body_set_parses_json_values() {
        let modifiers = [modifier(
            ModifierContext::Request,
            ModifierScope::Body,
            ModifierAction::Set,
            "meta",
            r#"{"source":"gateway"}"#,
        )];
        let (templated, _) =
            apply_request_modifiers(backend_request(), &modifiers, &inbound(), &History::new());
        assert_eq!(
            templated.body().unwrap().to_json().unwrap()["meta"],
            json!({"source": "gateway"})
        );
    }

    #[test]
    fn test_response_modifiers_ignore_request_context() {
        let response = BackendResponse::new(200, Header::new(), Some(Body::json(&json!({"a": 1}))));
        let modifiers = [modifier(
            ModifierContext::Request,
            ModifierScope::Body,
            ModifierAction::Delete,
            "a",
            "",
        )];
        let (shaped, _) =
            apply_response_modifiers(response, &modifiers, &inbound(), &History::new());
        assert_eq!(shaped.body().unwrap().to_json().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_response_header_delete() {
        let response =
            BackendResponse::new(200, Header::new().add("X-Internal", "1"), None);
        let modifiers = [modifier(
            ModifierContext::Response,
            ModifierScope::Header,
            ModifierAction::Delete,
            "X-Internal",
            "",
        )];
        let (shaped, _) =
            apply_response_modifiers(response, &modifiers, &inbound(), &History::new());
        assert!(!shaped.header().exists("X-Internal"));
    }
}
