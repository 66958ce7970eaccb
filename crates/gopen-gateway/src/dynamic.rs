//! Dynamic-value substitution.
//!
//! Replaces `#request.<path>` and `#responses[i].<path>` tokens in config
//! strings with values taken from the live request and the backend call
//! history. Unresolvable paths leave the token in place; malformed
//! prefixes are collected as errors.

use crate::error::GatewayError;
use crate::jsonpath;
use crate::model::{History, HttpRequest};
use regex::Regex;
use std::sync::OnceLock;

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| Regex::new(r"\B#[A-Za-z0-9_.\-\[\]]+").expect("valid token regex"))
}

/// Substitutes every token found in `value`, one replacement per token
/// occurrence in scanner order. Returns the substituted string and the
/// collected (non-`ValueNotFound`) errors.
pub fn resolve(
    value: &str,
    request: &HttpRequest,
    history: &History,
) -> (String, Vec<GatewayError>) {
    let mut resolved = value.to_string();
    let mut errors = Vec::new();
    let tokens: Vec<String> = token_regex()
        .find_iter(value)
        .map(|m| m.as_str().to_string())
        .collect();

    for token in tokens {
        match lookup(&token, request, history) {
            Ok(replacement) => {
                resolved = resolved.replacen(&token, &replacement, 1);
            }
            Err(err) if err.is_value_not_found() => {}
            Err(err) => errors.push(err),
        }
    }
    (resolved, errors)
}

/// Like [`resolve`], but a resolved value that parses as a JSON array is
/// split into its elements' string forms.
pub fn resolve_as_slice(
    value: &str,
    request: &HttpRequest,
    history: &History,
) -> (Vec<String>, Vec<GatewayError>) {
    let (resolved, errors) = resolve(value, request, history);
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(&resolved) {
        let strings = items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        return (strings, errors);
    }
    (vec![resolved], errors)
}

fn lookup(
    token: &str,
    request: &HttpRequest,
    history: &History,
) -> Result<String, GatewayError> {
    let cleaned = token.replace('#', "");
    let prefix = cleaned
        .split(['.', '['])
        .next()
        .unwrap_or_default();

    match prefix {
        "request" => {
            let doc = request.to_json()?;
            let path = cleaned.strip_prefix("request.").unwrap_or(&cleaned);
            let found = jsonpath::get(&doc, path);
            if found.exists() {
                Ok(found.to_string_form())
            } else {
                Err(GatewayError::value_not_found(path))
            }
        }
        "responses" => {
            let doc = history.to_json()?;
            let found = jsonpath::get(&doc, &cleaned);
            if found.exists() {
                Ok(found.to_string_form())
            } else {
                Err(GatewayError::value_not_found(&cleaned))
            }
        }
        other => Err(GatewayError::invalid_syntax(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use crate::model::{BackendRequest, BackendResponse, Body, Header, Query, UrlPath};
    use serde_json::json;
    use std::sync::Arc;

    fn request() -> HttpRequest {
        HttpRequest::new(
            UrlPath::new("/users/:id", vec![("id".to_string(), "42".to_string())]),
            "/users/42".to_string(),
            "POST".to_string(),
            Header::new().add("X-Api-Key", "secret"),
            Query::new().add("full", "true"),
            Some(Body::json(&json!({"userId": "u-7", "tags": ["a", "b"]}))),
        )
    }

    fn history() -> History {
        let mut history = History::new();
        history.push(
            Arc::new(Backend::for_tests("http://svc", "/x", "GET")),
            BackendRequest::new(
                "http://svc".to_string(),
                UrlPath::new("/x", vec![]),
                "GET".to_string(),
                Header::new(),
                Query::new(),
                None,
            ),
            BackendResponse::new(200, Header::new(), Some(Body::json(&json!({"id": 9})))),
        );
        history
    }

    #[test]
    fn test_resolves_request_paths() {
        let (resolved, errors) = resolve("#request.body.userId", &request(), &history());
        assert_eq!(resolved, "u-7");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_resolves_params_header_query_method() {
        let req = request();
        let hist = history();
        assert_eq!(resolve("#request.params.id", &req, &hist).0, "42");
        assert_eq!(resolve("#request.header.X-Api-Key", &req, &hist).0, "secret");
        assert_eq!(resolve("#request.query.full", &req, &hist).0, "true");
        assert_eq!(resolve("#request.method", &req, &hist).0, "POST");
    }

    #[test]
    fn test_resolves_history_paths() {
        let (resolved, errors) = resolve("#responses[0].body.id", &request(), &history());
        assert_eq!(resolved, "9");
        assert!(errors.is_empty());

        let (resolved, _) = resolve("#responses.0.statusCode", &request(), &history());
        assert_eq!(resolved, "200");
    }

    #[test]
    fn test_unresolved_tokens_left_as_is_without_errors() {
        let input = "#request.body.missing and #responses[9].body";
        let (resolved, errors) = resolve(input, &request(), &history());
        assert_eq!(resolved, input);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_invalid_prefix_collected() {
        let (resolved, errors) = resolve("#nowhere.path", &request(), &history());
        assert_eq!(resolved, "#nowhere.path");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Invalid prefix syntax"));
    }

    #[test]
    fn test_substitution_inside_larger_string() {
        let (resolved, _) = resolve("user=#request.body.userId;v=1", &request(), &history());
        assert_eq!(resolved, "user=u-7;v=1");
    }

    #[test]
    fn test_resolve_as_slice_splits_json_arrays() {
        let (values, errors) = resolve_as_slice("#request.body.tags", &request(), &history());
        assert_eq!(values, vec!["a", "b"]);
        assert!(errors.is_empty());

        let (values, _) = resolve_as_slice("#request.body.userId", &request(), &history());
        assert_eq!(values, vec!["u-7"]);
    }
}
