//! Outbound HTTP transport to backends.
//!
//! The `HttpTransport` trait is the seam between the pipeline and the
//! wire; the hyper implementation carries a shared connection pool. No
//! automatic decompression happens between the gateway and a backend.

use crate::error::GatewayError;
use crate::model::{BackendRequest, BackendResponse, Body, Header};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn make_request(
        &self,
        request: &BackendRequest,
    ) -> Result<BackendResponse, GatewayError>;
}

type PooledClient = Client<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    Full<Bytes>,
>;

pub struct HyperTransport {
    client: PooledClient,
}

impl HyperTransport {
    pub fn new() -> Self {
        let mut http_connector = hyper_util::client::legacy::connect::HttpConnector::new();
        http_connector.set_keepalive(Some(Duration::from_secs(60)));
        http_connector.set_connect_timeout(Some(Duration::from_secs(10)));
        http_connector.enforce_http(false);

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("Failed to load native root certificates")
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(32)
            .build(https_connector);

        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn make_request(
        &self,
        request: &BackendRequest,
    ) -> Result<BackendResponse, GatewayError> {
        let url = request.url();
        let mut builder = Request::builder().method(request.method()).uri(url.as_str());
        for (key, values) in request.header().iter() {
            // Host is derived from the backend URL, never forwarded.
            if key.eq_ignore_ascii_case("host") {
                continue;
            }
            for value in values {
                builder = builder.header(key, value);
            }
        }
        let body_bytes = request
            .body()
            .map(|body| body.raw_bytes().clone())
            .unwrap_or_default();
        let outbound = builder
            .body(Full::new(body_bytes))
            .map_err(|e| GatewayError::backend_transport(format!("Invalid backend request: {e}")))?;

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| GatewayError::backend_transport(format!("{url}: {e}")))?;

        let (parts, incoming) = response.into_parts();
        let collected = incoming
            .collect()
            .await
            .map_err(|e| {
                GatewayError::backend_transport(format!("Failed to read backend response: {e}"))
            })?
            .to_bytes();

        let mut header = Header::new();
        for (key, value) in parts.headers.iter() {
            if let Ok(value) = value.to_str() {
                header = header.add(key.as_str(), value);
            }
        }
        let body = Body::from_headers(
            header.get_first("Content-Type"),
            header.get_first("Content-Encoding"),
            collected,
        );

        Ok(BackendResponse::new(parts.status.as_u16(), header, body))
    }
}
