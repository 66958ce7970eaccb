//! Backend execution: templating, transport, response shaping, history.

use crate::config::Backend;
use crate::error::GatewayError;
use crate::model::{
    BackendRequest, BackendResponse, Body, Header, History, HttpRequest, Query,
};
use crate::shaper;
use crate::client::HttpTransport;
use crate::jsonpath;
use serde_json::json;
use std::sync::Arc;

pub struct BackendExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl BackendExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Runs one backend: templates the request from the inbound request
    /// and history, invokes the transport, shapes the response, and
    /// appends the triple to history. A transport failure records a
    /// synthesized 502 entry instead of failing the pipeline.
    pub async fn execute(
        &self,
        backend: &Arc<Backend>,
        inbound: &HttpRequest,
        history: &mut History,
    ) -> Vec<GatewayError> {
        let mut errors = Vec::new();

        let (backend_request, mut template_errors) =
            self.template_request(backend, inbound, history);
        errors.append(&mut template_errors);

        tracing::debug!(
            method = backend_request.method(),
            url = %backend_request.url(),
            "Calling backend"
        );

        let response = match self.transport.make_request(&backend_request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(url = %backend_request.url(), error = %err, "Backend transport failed");
                let body = Body::json(&json!({"error": err.message}));
                BackendResponse::new(502, Header::new(), Some(body))
            }
        };

        let (shaped, mut shape_errors) = self.shape_response(backend, response, inbound, history);
        errors.append(&mut shape_errors);

        history.push(Arc::clone(backend), backend_request, shaped);
        errors
    }

    /// Builds the outbound request from a copy of the inbound one:
    /// omit flags, forwarded filters, then request-scope modifiers.
    fn template_request(
        &self,
        backend: &Backend,
        inbound: &HttpRequest,
        history: &History,
    ) -> (BackendRequest, Vec<GatewayError>) {
        let host = backend.balanced_host().to_string();
        let path = inbound.path().with_template(&backend.path);

        let mut header = inbound.header().clone();
        let mut query = inbound.query().clone();
        let mut body = inbound.body().cloned();

        if let Some(request_config) = &backend.request {
            if request_config.omit_header {
                header = Header::new();
            } else {
                header = header.filter_by_forwarded(&request_config.forward_headers);
            }
            if request_config.omit_query {
                query = Query::new();
            } else {
                query = query.filter_by_forwarded(&request_config.forward_queries);
            }
            if request_config.omit_body {
                body = None;
            }
        }

        let backend_request = BackendRequest::new(
            host,
            path,
            backend.method.clone(),
            header,
            query,
            body,
        );

        match &backend.request {
            Some(request_config) if !request_config.modifiers.is_empty() => {
                shaper::apply_request_modifiers(
                    backend_request,
                    &request_config.modifiers,
                    inbound,
                    history,
                )
            }
            _ => (backend_request, Vec::new()),
        }
    }

    /// Applies the backend's declared response shaping: omit flags and
    /// field paths, projection, mapping, then response-scope modifiers.
    fn shape_response(
        &self,
        backend: &Backend,
        response: BackendResponse,
        inbound: &HttpRequest,
        history: &History,
    ) -> (BackendResponse, Vec<GatewayError>) {
        let Some(response_config) = &backend.response else {
            return (response, Vec::new());
        };
        let mut errors = Vec::new();
        let mut response = response;

        if response_config.omit_header {
            response = response.with_header(Header::new());
        }
        if response_config.omit_body {
            response = response.with_body(None);
        }

        if let Some(body) = response.body() {
            let mut shaped = body.clone();

            if !response_config.omit_body_fields.is_empty() && shaped.content_type().is_json() {
                match shaped.to_json() {
                    Ok(mut document) => {
                        for path in &response_config.omit_body_fields {
                            document = jsonpath::delete(document, path);
                        }
                        match shaped.with_json(&document) {
                            Ok(new_body) => shaped = new_body,
                            Err(err) => errors.push(err),
                        }
                    }
                    Err(err) => errors.push(err),
                }
            }

            if let Some(projection) = &response_config.projection {
                let (projected, mut projection_errors) = shaper::project(&shaped, projection);
                shaped = projected;
                errors.append(&mut projection_errors);
            }

            let (mapped, mut mapping_errors) = shaper::map_fields(&shaped, &response_config.mapping);
            shaped = mapped;
            errors.append(&mut mapping_errors);

            response = response.with_body(Some(shaped));
        }

        if !response_config.modifiers.is_empty() {
            let (modified, mut modifier_errors) = shaper::apply_response_modifiers(
                response,
                &response_config.modifiers,
                inbound,
                history,
            );
            response = modified;
            errors.append(&mut modifier_errors);
        }

        (response, errors)
    }
}
