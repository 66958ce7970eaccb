//! Endpoint orchestration: beforewares → backends → afterwares, the
//! abort rule, and final response composition.

use crate::config::{Backend, BackendResponseConfig, Endpoint, Gopen};
use crate::error::GatewayError;
use crate::executor::BackendExecutor;
use crate::model::{
    Body, Header, History, HttpRequest, HttpResponse, CONTENT_ENCODING, CONTENT_LENGTH,
    CONTENT_TYPE, X_GOPEN_CACHE, X_GOPEN_COMPLETE, X_GOPEN_SUCCESS,
};
use crate::shaper;
use std::collections::HashMap;
use std::sync::Arc;

/// An endpoint with its middleware names resolved to backends, built
/// once at boot. Unknown names are config errors, never runtime errors.
#[derive(Clone)]
pub struct RuntimeEndpoint {
    pub endpoint: Arc<Endpoint>,
    pub beforewares: Vec<Arc<Backend>>,
    pub backends: Vec<Arc<Backend>>,
    pub afterwares: Vec<Arc<Backend>>,
}

impl RuntimeEndpoint {
    pub fn build(gopen: &Gopen, endpoint: &Endpoint) -> Self {
        let resolve = |names: &[String]| {
            names
                .iter()
                .filter_map(|name| gopen.middlewares.get(name))
                .map(|middleware| Arc::new(as_middleware(middleware.clone())))
                .collect::<Vec<_>>()
        };

        let mut endpoint = endpoint.clone();
        if let Some(default_nomenclature) = gopen.nomenclature {
            let response = endpoint.response.get_or_insert_with(Default::default);
            response.nomenclature.get_or_insert(default_nomenclature);
        }

        Self {
            beforewares: resolve(&endpoint.beforewares),
            backends: endpoint.backends.iter().cloned().map(Arc::new).collect(),
            afterwares: resolve(&endpoint.afterwares),
            endpoint: Arc::new(endpoint),
        }
    }
}

/// Middleware backends execute for their side effects; their responses
/// never take part in composition.
fn as_middleware(mut backend: Backend) -> Backend {
    match &mut backend.response {
        Some(response) => response.omit = true,
        None => {
            backend.response = Some(BackendResponseConfig {
                omit: true,
                ..Default::default()
            })
        }
    }
    backend
}

pub struct Orchestrator {
    executor: BackendExecutor,
}

impl Orchestrator {
    pub fn new(executor: BackendExecutor) -> Self {
        Self { executor }
    }

    /// Runs the full backend sequence for one request and composes the
    /// response. Shaping errors are accumulated, not fatal.
    pub async fn execute(
        &self,
        runtime: &RuntimeEndpoint,
        inbound: &HttpRequest,
    ) -> (HttpResponse, Vec<GatewayError>) {
        let endpoint = &runtime.endpoint;
        let mut history = History::new();
        let mut errors = Vec::new();

        let stages = runtime
            .beforewares
            .iter()
            .chain(&runtime.backends)
            .chain(&runtime.afterwares);

        for backend in stages {
            errors.extend(self.executor.execute(backend, inbound, &mut history).await);

            let last_status = history
                .last()
                .map(|entry| entry.response().status_code())
                .unwrap_or_default();
            if endpoint.abort_if(last_status) {
                tracing::debug!(status = last_status, "Backend sequence aborted");
                return (build_aborted_response(endpoint, &history), errors);
            }
        }

        let (response, mut build_errors) = build_response(endpoint, &history);
        errors.append(&mut build_errors);
        (response, errors)
    }
}

/// Every recorded entry counts against the endpoint's non-omit backend
/// count, so an aborted sequence can never report itself complete.
fn complete(endpoint: &Endpoint, history: &History) -> bool {
    history.size() == endpoint.non_omit_count()
}

/// Aborted response: the last backend's status, header, and body, under
/// the gateway observability headers.
fn build_aborted_response(endpoint: &Endpoint, history: &History) -> HttpResponse {
    let last = history.last().expect("abort implies at least one entry");
    let response = last.response();

    let header = Header::new()
        .set(X_GOPEN_CACHE, "false")
        .set(X_GOPEN_SUCCESS, &response.ok().to_string())
        .set(X_GOPEN_COMPLETE, &complete(endpoint, history).to_string());
    let header = shaper::aggregate_headers(&header, response.header());

    HttpResponse::new(response.status_code(), header, response.body().cloned())
}

fn build_response(endpoint: &Endpoint, history: &History) -> (HttpResponse, Vec<GatewayError>) {
    let mut errors = Vec::new();

    let status_code = build_status_code(history);
    let (body, mut body_errors) = build_body(endpoint, history);
    errors.append(&mut body_errors);
    let header = build_header(endpoint, body.as_ref(), history);

    (HttpResponse::new(status_code, header, body), errors)
}

/// One non-omit response uses its code; several use the most frequent
/// code with ties broken by last occurrence; none yields 204.
fn build_status_code(history: &History) -> u16 {
    if history.multiple_responses() {
        let mut counts: HashMap<u16, usize> = HashMap::new();
        let mut best = (204u16, 0usize);
        for entry in history.non_omit() {
            let code = entry.response().status_code();
            let count = counts.entry(code).and_modify(|c| *c += 1).or_insert(1);
            if *count >= best.1 {
                best = (code, *count);
            }
        }
        best.0
    } else if let Some(entry) = history.non_omit().next() {
        entry.response().status_code()
    } else {
        204
    }
}

fn build_body(endpoint: &Endpoint, history: &History) -> (Option<Body>, Vec<GatewayError>) {
    let mut errors = Vec::new();

    let body = if history.multiple_responses() {
        let aggregate = endpoint
            .response
            .as_ref()
            .is_some_and(|response| response.aggregate);
        let (body, mut aggregate_errors) = if aggregate {
            shaper::aggregate_bodies(history)
        } else {
            shaper::aggregate_bodies_into_slice(history)
        };
        errors.append(&mut aggregate_errors);
        body
    } else {
        history
            .non_omit()
            .next()
            .and_then(|entry| entry.response().body().cloned())
    };

    let Some(response_config) = &endpoint.response else {
        return (body, errors);
    };
    let Some(mut body) = body else {
        return (None, errors);
    };

    if response_config.omit_empty {
        let (cleaned, mut omit_errors) = shaper::omit_empty(&body);
        body = cleaned;
        errors.append(&mut omit_errors);
    }
    if let Some(nomenclature) = response_config.nomenclature {
        let (renamed, mut case_errors) = shaper::to_case(&body, nomenclature);
        body = renamed;
        errors.append(&mut case_errors);
    }
    match shaper::modify_content_type(&body, response_config.content_type) {
        Ok(converted) => body = converted,
        Err(err) => errors.push(err),
    }
    match shaper::modify_content_encoding(&body, response_config.content_encoding) {
        Ok(encoded) => body = encoded,
        Err(err) => errors.push(err),
    }

    (Some(body), errors)
}

fn build_header(endpoint: &Endpoint, body: Option<&Body>, history: &History) -> Header {
    let mut header = Header::new()
        .set(X_GOPEN_CACHE, "false")
        .set(X_GOPEN_SUCCESS, &history.all_ok().to_string())
        .set(X_GOPEN_COMPLETE, &complete(endpoint, history).to_string());
    if let Some(body) = body {
        header = header
            .set(CONTENT_TYPE, body.content_type().mime())
            .set(CONTENT_LENGTH, &body.len().to_string());
        if !body.content_encoding().is_identity() {
            header = header.set(CONTENT_ENCODING, body.content_encoding().as_str());
        }
    }

    for entry in history.iter() {
        header = shaper::aggregate_headers(&header, entry.response().header());
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpTransport;
    use crate::model::{BackendRequest, BackendResponse, Query, UrlPath};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    struct MockTransport {
        responses: Mutex<Vec<BackendResponse>>,
        calls: Mutex<usize>,
    }

    impl MockTransport {
        fn scripted(responses: Vec<BackendResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn make_request(
            &self,
            _request: &BackendRequest,
        ) -> Result<BackendResponse, GatewayError> {
            *self.calls.lock() += 1;
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Ok(BackendResponse::new(200, Header::new(), None));
            }
            Ok(responses.remove(0))
        }
    }

    fn json_response(status: u16, body: Value) -> BackendResponse {
        BackendResponse::new(status, Header::new(), Some(Body::json(&body)))
    }

    fn inbound() -> HttpRequest {
        HttpRequest::new(
            UrlPath::new("/x", vec![]),
            "/x".to_string(),
            "GET".to_string(),
            Header::new(),
            Query::new(),
            None,
        )
    }

    fn runtime(yaml: &str) -> RuntimeEndpoint {
        let gopen: Gopen = serde_yaml::from_str(yaml).unwrap();
        gopen.validate().unwrap();
        RuntimeEndpoint::build(&gopen, &gopen.endpoints[0])
    }

    fn two_backend_yaml(extra: &str) -> String {
        format!(
            "endpoints:\n\
             - path: /x\n\
             \x20 method: GET\n\
             {extra}\
             \x20 backends:\n\
             \x20 - hosts: [\"http://a\"]\n\
             \x20   path: /a\n\
             \x20   method: GET\n\
             \x20 - hosts: [\"http://b\"]\n\
             \x20   path: /b\n\
             \x20   method: GET\n"
        )
    }

    #[tokio::test]
    async fn test_single_backend_pass_through() {
        let transport = MockTransport::scripted(vec![json_response(200, json!({"id": 42, "name": "a"}))]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport.clone()));
        let runtime = runtime(
            "endpoints:\n- path: /x\n  method: GET\n  backends:\n  - hosts: [\"http://a\"]\n    path: /a\n    method: GET\n",
        );

        let (response, errors) = orchestrator.execute(&runtime, &inbound()).await;

        assert!(errors.is_empty());
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body().unwrap().to_json().unwrap(), json!({"id": 42, "name": "a"}));
        assert_eq!(response.header().get_first(X_GOPEN_SUCCESS), Some("true"));
        assert_eq!(response.header().get_first(X_GOPEN_COMPLETE), Some("true"));
        assert_eq!(response.header().get_first(X_GOPEN_CACHE), Some("false"));
    }

    #[tokio::test]
    async fn test_aggregate_two_backends() {
        let transport = MockTransport::scripted(vec![
            json_response(200, json!({"a": 1})),
            json_response(200, json!({"b": 2})),
        ]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport));
        let runtime = runtime(&two_backend_yaml("\x20 response:\n\x20   aggregate: true\n"));

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body().unwrap().to_json().unwrap(), json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn test_multiple_backends_without_aggregate_yield_slice() {
        let transport = MockTransport::scripted(vec![
            json_response(200, json!({"a": 1})),
            json_response(200, json!({"b": 2})),
        ]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport));
        let runtime = runtime(&two_backend_yaml(""));

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;
        assert_eq!(
            response.body().unwrap().to_json().unwrap(),
            json!([{"a": 1}, {"b": 2}])
        );
    }

    #[tokio::test]
    async fn test_abort_on_declared_status_skips_remaining_backends() {
        let transport = MockTransport::scripted(vec![
            json_response(200, json!({"a": 1})),
            json_response(404, json!({"err": "x"})),
            json_response(200, json!({"c": 3})),
        ]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport.clone()));
        let yaml = "endpoints:\n\
                    - path: /x\n\
                    \x20 method: GET\n\
                    \x20 abort_if_status_codes: [404]\n\
                    \x20 backends:\n\
                    \x20 - hosts: [\"http://a\"]\n\
                    \x20   path: /a\n\
                    \x20   method: GET\n\
                    \x20 - hosts: [\"http://b\"]\n\
                    \x20   path: /b\n\
                    \x20   method: GET\n\
                    \x20 - hosts: [\"http://c\"]\n\
                    \x20   path: /c\n\
                    \x20   method: GET\n";
        let runtime = runtime(yaml);

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;

        assert_eq!(transport.calls(), 2, "third backend must not be invoked");
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.body().unwrap().to_json().unwrap(), json!({"err": "x"}));
        assert_eq!(response.header().get_first(X_GOPEN_COMPLETE), Some("false"));
        assert_eq!(response.header().get_first(X_GOPEN_SUCCESS), Some("false"));
    }

    #[tokio::test]
    async fn test_default_abort_rule_is_4xx() {
        let transport = MockTransport::scripted(vec![json_response(500, json!({"err": "boom"}))]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport.clone()));
        let runtime = runtime(&two_backend_yaml(""));

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;
        assert_eq!(transport.calls(), 1);
        assert_eq!(response.status_code(), 500);
    }

    #[tokio::test]
    async fn test_most_frequent_status_ties_take_last_occurrence() {
        let transport = MockTransport::scripted(vec![
            json_response(200, json!({"a": 1})),
            json_response(201, json!({"b": 2})),
        ]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport));
        let yaml = two_backend_yaml("\x20 abort_if_status_codes: []\n");
        let runtime = runtime(&yaml);

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;
        assert_eq!(response.status_code(), 201);
    }

    #[tokio::test]
    async fn test_beforeware_runs_first_and_is_omitted() {
        let transport = MockTransport::scripted(vec![
            json_response(200, json!({"middleware": true})),
            json_response(200, json!({"data": 1})),
        ]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport.clone()));
        let yaml = "middlewares:\n\
                    \x20 auth:\n\
                    \x20   hosts: [\"http://auth\"]\n\
                    \x20   path: /check\n\
                    \x20   method: POST\n\
                    endpoints:\n\
                    - path: /x\n\
                    \x20 method: GET\n\
                    \x20 beforewares: [auth]\n\
                    \x20 backends:\n\
                    \x20 - hosts: [\"http://a\"]\n\
                    \x20   path: /a\n\
                    \x20   method: GET\n";
        let runtime = runtime(yaml);

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;

        assert_eq!(transport.calls(), 2);
        // The middleware's body never reaches the composed response.
        assert_eq!(response.body().unwrap().to_json().unwrap(), json!({"data": 1}));
    }

    #[tokio::test]
    async fn test_aborting_beforeware_short_circuits() {
        let transport = MockTransport::scripted(vec![json_response(401, json!({"err": "denied"}))]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport.clone()));
        let yaml = "middlewares:\n\
                    \x20 auth:\n\
                    \x20   hosts: [\"http://auth\"]\n\
                    \x20   path: /check\n\
                    \x20   method: POST\n\
                    endpoints:\n\
                    - path: /x\n\
                    \x20 method: GET\n\
                    \x20 beforewares: [auth]\n\
                    \x20 backends:\n\
                    \x20 - hosts: [\"http://a\"]\n\
                    \x20   path: /a\n\
                    \x20   method: GET\n";
        let runtime = runtime(yaml);

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;
        assert_eq!(transport.calls(), 1);
        assert_eq!(response.status_code(), 401);
    }

    #[tokio::test]
    async fn test_zero_non_omit_responses_yield_204() {
        let transport = MockTransport::scripted(vec![json_response(200, json!({"hidden": 1}))]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport));
        let yaml = "endpoints:\n\
                    - path: /x\n\
                    \x20 method: GET\n\
                    \x20 backends:\n\
                    \x20 - hosts: [\"http://a\"]\n\
                    \x20   path: /a\n\
                    \x20   method: GET\n\
                    \x20   response:\n\
                    \x20     omit: true\n";
        let runtime = runtime(yaml);

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;
        assert_eq!(response.status_code(), 204);
        assert!(response.body().is_none());
    }

    #[tokio::test]
    async fn test_response_shaping_chain_applies() {
        let transport = MockTransport::scripted(vec![json_response(
            200,
            json!({"user_name": "a", "empty": ""}),
        )]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport));
        let yaml = "endpoints:\n\
                    - path: /x\n\
                    \x20 method: GET\n\
                    \x20 response:\n\
                    \x20   omit_empty: true\n\
                    \x20   nomenclature: camel\n\
                    \x20 backends:\n\
                    \x20 - hosts: [\"http://a\"]\n\
                    \x20   path: /a\n\
                    \x20   method: GET\n";
        let runtime = runtime(yaml);

        let (response, errors) = orchestrator.execute(&runtime, &inbound()).await;
        assert!(errors.is_empty());
        assert_eq!(response.body().unwrap().to_json().unwrap(), json!({"userName": "a"}));
    }

    #[tokio::test]
    async fn test_global_nomenclature_default_applies() {
        let transport = MockTransport::scripted(vec![json_response(200, json!({"user_name": "a"}))]);
        let orchestrator = Orchestrator::new(BackendExecutor::new(transport));
        let yaml = "nomenclature: camel\n\
                    endpoints:\n\
                    - path: /x\n\
                    \x20 method: GET\n\
                    \x20 backends:\n\
                    \x20 - hosts: [\"http://a\"]\n\
                    \x20   path: /a\n\
                    \x20   method: GET\n";
        let runtime = runtime(yaml);

        let (response, _) = orchestrator.execute(&runtime, &inbound()).await;
        assert_eq!(response.body().unwrap().to_json().unwrap(), json!({"userName": "a"}));
    }

    #[test]
    fn test_build_header_carries_content_metadata() {
        let endpoint: Endpoint = serde_yaml::from_str(
            "path: /x\nmethod: GET\nbackends:\n- hosts: [\"http://a\"]\n  path: /a\n  method: GET\n",
        )
        .unwrap();
        let body = Body::json(&json!({"a": 1}));
        let header = build_header(&endpoint, Some(&body), &History::new());
        assert_eq!(header.get_first(CONTENT_TYPE), Some("application/json"));
        assert_eq!(
            header.get_first(CONTENT_LENGTH),
            Some(body.len().to_string().as_str())
        );
    }
}
