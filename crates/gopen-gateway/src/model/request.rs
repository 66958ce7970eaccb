//! Immutable inbound request value.

use super::body::Body;
use super::header::{Header, X_FORWARDED_FOR};
use super::path::UrlPath;
use super::query::Query;
use crate::error::GatewayError;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct HttpRequest {
    path: UrlPath,
    url: String,
    method: String,
    header: Header,
    query: Query,
    body: Option<Body>,
}

impl HttpRequest {
    pub fn new(
        path: UrlPath,
        url: String,
        method: String,
        header: Header,
        query: Query,
        body: Option<Body>,
    ) -> Self {
        Self {
            path,
            url,
            method,
            header,
            query,
            body,
        }
    }

    pub fn path(&self) -> &UrlPath {
        &self.path
    }

    /// The concrete request line target, query included.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// First `X-Forwarded-For` hop: the observed client IP.
    pub fn client_ip(&self) -> &str {
        self.header
            .get_first(X_FORWARDED_FOR)
            .map(|v| v.split(',').next().unwrap_or(v).trim())
            .unwrap_or("")
    }

    pub fn with_header(&self, header: Header) -> Self {
        let mut copied = self.clone();
        copied.header = header;
        copied
    }

    pub fn with_query(&self, query: Query) -> Self {
        let mut copied = self.clone();
        copied.query = query;
        copied
    }

    pub fn with_body(&self, body: Option<Body>) -> Self {
        let mut copied = self.clone();
        copied.body = body;
        copied
    }

    /// Serialized form queried by the dynamic-value resolver. Keys:
    /// `header`, `query`, `params`, `body`, `url`, `method`.
    pub fn to_json(&self) -> Result<Value, GatewayError> {
        let mut map = Map::new();
        map.insert("url".to_string(), Value::String(self.url.clone()));
        map.insert("method".to_string(), Value::String(self.method.clone()));
        map.insert("header".to_string(), self.header.to_json());
        map.insert("params".to_string(), self.path.params_to_json());
        map.insert("query".to_string(), self.query.to_json());
        let body = match &self.body {
            Some(body) => body.to_json()?,
            None => Value::Null,
        };
        map.insert("body".to_string(), body);
        Ok(Value::Object(map))
    }
}
