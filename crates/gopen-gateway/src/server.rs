//! HTTP server: accept loop, endpoint routing, the middleware chain
//! driver, and the inbound/outbound adapter between hyper and the value
//! model.

use crate::cache::CacheStore;
use crate::client::HttpTransport;
use crate::config::{Endpoint, Gopen, LimiterConfig};
use crate::error::{ErrorBody, GatewayError};
use crate::executor::BackendExecutor;
use crate::limiter::{allow_size, RateLimiter};
use crate::middleware::{cache::CacheMiddleware, cors, recovery, timeout, trace, RequestLog};
use crate::model::{
    Body as ModelBody, Header, HttpRequest, HttpResponse, Query, UrlPath, CONTENT_ENCODING,
    CONTENT_LENGTH, CONTENT_TYPE, X_GOPEN_CACHE, X_GOPEN_COMPLETE, X_GOPEN_SUCCESS,
};
use crate::pipeline::{Orchestrator, RuntimeEndpoint};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

const STATIC_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GatewayServer {
    gopen: Arc<Gopen>,
    endpoints: Vec<RuntimeEndpoint>,
    /// One matchit router per HTTP method, mapping paths to endpoint
    /// indices.
    routers: HashMap<String, matchit::Router<usize>>,
    limiter: RateLimiter,
    cache: CacheMiddleware,
    orchestrator: Orchestrator,
}

impl GatewayServer {
    pub fn new(
        gopen: Gopen,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CacheStore>,
    ) -> Result<Self, anyhow::Error> {
        let mut endpoints = Vec::new();
        let mut routers: HashMap<String, matchit::Router<usize>> = HashMap::new();

        for endpoint in &gopen.endpoints {
            let index = endpoints.len();
            endpoints.push(RuntimeEndpoint::build(&gopen, endpoint));
            routers
                .entry(endpoint.method.to_uppercase())
                .or_default()
                .insert(to_router_path(&endpoint.path), index)?;
            info!("Registered route: {}", endpoint.resume());
        }

        Ok(Self {
            gopen: Arc::new(gopen),
            endpoints,
            routers,
            limiter: RateLimiter::new(),
            cache: CacheMiddleware::new(store),
            orchestrator: Orchestrator::new(BackendExecutor::new(transport)),
        })
    }

    /// Accept loop: one task per connection, HTTP/1.1.
    pub async fn run(self, port: u16) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        info!("LISTEN AND SERVE :{port}");

        let server = Arc::new(self);
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move {
                        Ok::<_, Infallible>(server.handle(req, remote_addr.ip()).await)
                    }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {remote_addr}: {err}");
                }
            });
        }
    }

    /// Full per-request flow. Generic over the inbound body so tests can
    /// drive it without a socket.
    pub async fn handle<B>(&self, req: hyper::Request<B>, remote_ip: IpAddr) -> hyper::Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let method = req.method().as_str().to_uppercase();
        let path = req.uri().path().to_string();

        if method == "GET" && matches!(path.as_str(), "/ping" | "/version" | "/settings") {
            return self.handle_static(&path, req, remote_ip).await;
        }

        let Some((index, params)) = self.match_route(&method, &path) else {
            let err = GatewayError::new(
                crate::error::ErrorKind::ValueNotFound,
                format!("No endpoint found for {method} {path}"),
            );
            let response = error_response(&path, 404, &err);
            return write_response(&ResponseWriter::new(), &response)
                .expect("first write always succeeds");
        };
        let runtime = self.endpoints[index].clone();
        let endpoint = Arc::clone(&runtime.endpoint);

        let request = match parse_request(req, &endpoint, params, remote_ip).await {
            Ok(request) => request,
            Err(err) => {
                let response = error_response(&endpoint.path, err.status_code(), &err);
                return write_response(&ResponseWriter::new(), &response)
                    .expect("first write always succeeds");
            }
        };

        let writer = ResponseWriter::new();
        let log = RequestLog::start(&request);
        let deadline = endpoint.timeout(self.gopen.timeout_ms);

        let outcome = timeout::with_deadline(
            deadline,
            recovery::catch_panics(self.run_chain(&runtime, &request)),
        )
        .await;

        let response = match outcome {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(err))) | Ok(Err(err)) | Err(err) => {
                error_response(&endpoint.path, err.status_code(), &err)
            }
        };
        log.finish(response.status_code());

        write_response(&writer, &response).expect("first write always succeeds")
    }

    /// cors → limiter → cache → orchestrator → cache store.
    async fn run_chain(
        &self,
        runtime: &RuntimeEndpoint,
        request: &HttpRequest,
    ) -> Result<HttpResponse, GatewayError> {
        let endpoint = &runtime.endpoint;

        cors::check(self.gopen.security_cors.as_ref(), request)?;

        let limits = self.effective_limits(endpoint);
        self.limiter
            .allow_rate(request, limits.rate.as_ref())?;
        allow_size(request, &limits)?;

        let cache_config = endpoint
            .cache
            .as_ref()
            .map(|cache| cache.merged(self.gopen.cache.as_ref()));
        if let Some(cache_config) = &cache_config {
            if let Some(hit) = self.cache.read(endpoint, cache_config, request).await {
                return Ok(hit);
            }
        }

        let (response, errors) = self.orchestrator.execute(runtime, request).await;
        for err in &errors {
            tracing::warn!(
                endpoint = %endpoint.path,
                error = %err,
                "Pipeline error accumulated"
            );
        }
        // Malformed dynamic-value tokens surface as 500 once every
        // substitution has been attempted.
        if let Some(err) = errors
            .iter()
            .find(|e| e.kind == crate::error::ErrorKind::InvalidSyntax)
        {
            return Err(err.clone());
        }

        if let Some(cache_config) = &cache_config {
            self.cache
                .write(endpoint, cache_config, request, &response)
                .await;
        }
        Ok(response)
    }

    fn effective_limits(&self, endpoint: &Endpoint) -> LimiterConfig {
        endpoint
            .limiter
            .clone()
            .or_else(|| self.gopen.limiter.clone())
            .unwrap_or_default()
    }

    fn match_route(&self, method: &str, path: &str) -> Option<(usize, Vec<(String, String)>)> {
        let router = self.routers.get(method)?;
        let matched = router.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Some((*matched.value, params))
    }

    /// Always-served static endpoints: `/ping`, `/version`, `/settings`.
    /// They run the static chain: timeout → recovery → log → limiter.
    async fn handle_static<B>(
        &self,
        path: &str,
        req: hyper::Request<B>,
        remote_ip: IpAddr,
    ) -> hyper::Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let body = match path {
            "/version" => ModelBody::text(self.version()),
            "/settings" => {
                let view = self.settings_view();
                ModelBody::json(&serde_json::to_value(&view).unwrap_or_default())
            }
            _ => ModelBody::text("pong"),
        };

        let request = trace::ensure_trace(
            HttpRequest::new(
                UrlPath::new(path, Vec::new()),
                path.to_string(),
                "GET".to_string(),
                inbound_header(req.headers()),
                Query::parse(req.uri().query()),
                None,
            ),
            remote_ip,
        );

        let writer = ResponseWriter::new();
        let log = RequestLog::start(&request);
        let limits = self.gopen.limiter.clone().unwrap_or_default();

        let outcome = timeout::with_deadline(
            STATIC_TIMEOUT,
            recovery::catch_panics(async {
                self.limiter.allow_rate(&request, limits.rate.as_ref())?;
                allow_size(&request, &limits)?;

                let header = static_header(&body);
                Ok::<_, GatewayError>(HttpResponse::new(200, header, Some(body)))
            }),
        )
        .await;

        let response = match outcome {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(err))) | Ok(Err(err)) | Err(err) => {
                error_response(path, err.status_code(), &err)
            }
        };
        log.finish(response.status_code());
        write_response(&writer, &response).expect("first write always succeeds")
    }

    fn version(&self) -> String {
        self.gopen
            .version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }

    fn settings_view(&self) -> SettingsView {
        let mut setting = (*self.gopen).clone();
        // Store credentials never leave the process.
        setting.store = None;
        SettingsView {
            version: self.version(),
            endpoints: self.gopen.endpoints.len(),
            middlewares: self.gopen.middlewares.len(),
            backends: self.gopen.count_backends(),
            setting,
        }
    }
}

#[derive(Serialize)]
struct SettingsView {
    version: String,
    endpoints: usize,
    middlewares: usize,
    backends: usize,
    setting: Gopen,
}

/// Converts `:name` path templates to the router's `{name}` syntax.
fn to_router_path(template: &str) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn inbound_header(headers: &hyper::HeaderMap) -> Header {
    let mut header = Header::new();
    for (key, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            header = header.add(key.as_str(), value);
        }
    }
    header
}

/// Parses the inbound hyper request into the value model, stamping the
/// trace headers. The body is fully buffered.
async fn parse_request<B>(
    req: hyper::Request<B>,
    endpoint: &Endpoint,
    params: Vec<(String, String)>,
    remote_ip: IpAddr,
) -> Result<HttpRequest, GatewayError>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().as_str().to_uppercase();
    let query = Query::parse(req.uri().query());
    let url = match req.uri().query() {
        Some(q) => format!("{}?{}", req.uri().path(), q),
        None => req.uri().path().to_string(),
    };
    let header = inbound_header(req.headers());

    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| {
            GatewayError::new(
                crate::error::ErrorKind::PayloadTooLarge,
                format!("Failed to read request body: {e}"),
            )
        })?
        .to_bytes();
    let body = ModelBody::from_headers(
        header.get_first(CONTENT_TYPE),
        header.get_first(CONTENT_ENCODING),
        bytes,
    );

    let path = UrlPath::new(&endpoint.path, params);
    let request = HttpRequest::new(path, url, method, header, query, body);
    Ok(trace::ensure_trace(request, remote_ip))
}

fn static_header(body: &ModelBody) -> Header {
    Header::new()
        .set(X_GOPEN_CACHE, "false")
        .set(X_GOPEN_COMPLETE, "true")
        .set(X_GOPEN_SUCCESS, "true")
        .set(CONTENT_TYPE, body.content_type().mime())
        .set(CONTENT_LENGTH, &body.len().to_string())
}

/// Short-circuit error response with the structured error body.
fn error_response(endpoint_path: &str, status: u16, err: &GatewayError) -> HttpResponse {
    let body = ModelBody::json(
        &serde_json::to_value(ErrorBody::new(endpoint_path, err)).unwrap_or_default(),
    );
    let header = Header::new()
        .set(X_GOPEN_CACHE, "false")
        .set(X_GOPEN_COMPLETE, "false")
        .set(X_GOPEN_SUCCESS, &(status < 400).to_string())
        .set(CONTENT_TYPE, body.content_type().mime())
        .set(CONTENT_LENGTH, &body.len().to_string());
    HttpResponse::new(status, header, Some(body))
}

/// Write-once guard on the adapter: the first write wins, later writes
/// are no-ops.
pub struct ResponseWriter {
    written: AtomicBool,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            written: AtomicBool::new(false),
        }
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders the model response onto the wire. Entity headers are emitted
/// from the body itself, so aggregated backend values can never produce
/// conflicting lengths.
fn write_response(
    writer: &ResponseWriter,
    response: &HttpResponse,
) -> Option<hyper::Response<Full<Bytes>>> {
    if writer.written.swap(true, Ordering::SeqCst) {
        return None;
    }

    let mut builder = hyper::Response::builder().status(response.status_code());
    for (key, values) in response.header().iter() {
        if key.eq_ignore_ascii_case(CONTENT_LENGTH) {
            continue;
        }
        if key.eq_ignore_ascii_case(CONTENT_TYPE) || key.eq_ignore_ascii_case(CONTENT_ENCODING) {
            if let Some(first) = values.first() {
                builder = builder.header(key, first);
            }
            continue;
        }
        for value in values {
            builder = builder.header(key, value);
        }
    }

    let bytes = response
        .body()
        .map(|body| body.raw_bytes().clone())
        .unwrap_or_default();
    Some(
        builder
            .body(Full::new(bytes))
            .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::new()))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_router_path_converts_params() {
        assert_eq!(to_router_path("/users/:id"), "/users/{id}");
        assert_eq!(to_router_path("/a/:x/b/:y"), "/a/{x}/b/{y}");
        assert_eq!(to_router_path("/plain"), "/plain");
    }

    #[test]
    fn test_response_writer_writes_once() {
        let writer = ResponseWriter::new();
        let response = HttpResponse::status_only(204, Header::new());
        assert!(write_response(&writer, &response).is_some());
        assert!(write_response(&writer, &response).is_none());
    }

    #[test]
    fn test_write_response_emits_entity_headers_from_body() {
        let body = ModelBody::text("pong");
        let header = Header::new()
            .set(CONTENT_TYPE, "text/plain")
            .add(CONTENT_LENGTH, "999")
            .add("X-Multi", "1")
            .add("X-Multi", "2");
        let response = HttpResponse::new(200, header, Some(body));

        let wire = write_response(&ResponseWriter::new(), &response).unwrap();
        assert!(wire.headers().get(CONTENT_LENGTH).is_none());
        assert_eq!(
            wire.headers()
                .get_all("X-Multi")
                .iter()
                .collect::<Vec<_>>()
                .len(),
            2
        );
    }

    #[test]
    fn test_error_response_body_shape() {
        let err = GatewayError::timeout();
        let response = error_response("/u/:id", err.status_code(), &err);
        assert_eq!(response.status_code(), 504);
        let body = response.body().unwrap().to_json().unwrap();
        assert_eq!(body["endpoint"], "/u/:id");
        assert!(body["message"].as_str().unwrap().contains("timeout"));
        assert!(body["file"].as_str().is_some());
        assert!(body["line"].as_u64().is_some());
        assert!(body["timestamp"].as_str().is_some());
    }
}
