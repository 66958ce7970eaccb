//! Immutable response values: the composed gateway response and the
//! per-backend request/response pair recorded in history.

use super::body::Body;
use super::header::Header;
use super::path::UrlPath;
use super::query::Query;
use crate::error::GatewayError;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct HttpResponse {
    status_code: u16,
    header: Header,
    body: Option<Body>,
}

impl HttpResponse {
    pub fn new(status_code: u16, header: Header, body: Option<Body>) -> Self {
        Self {
            status_code,
            header,
            body,
        }
    }

    pub fn status_only(status_code: u16, header: Header) -> Self {
        Self::new(status_code, header, None)
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn ok(&self) -> bool {
        self.status_code < 400
    }

    pub fn with_header(&self, header: Header) -> Self {
        let mut copied = self.clone();
        copied.header = header;
        copied
    }
}

/// The templated request sent to one backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    host: String,
    path: UrlPath,
    method: String,
    header: Header,
    query: Query,
    body: Option<Body>,
}

impl BackendRequest {
    pub fn new(
        host: String,
        path: UrlPath,
        method: String,
        header: Header,
        query: Query,
        body: Option<Body>,
    ) -> Self {
        Self {
            host,
            path,
            method,
            header,
            query,
            body,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &UrlPath {
        &self.path
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

    /// The full outbound URL: host + rendered path + query string.
    pub fn url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let path = self.path.rendered();
        if self.query.is_empty() {
            format!("{host}{path}")
        } else {
            format!("{host}{path}?{}", self.query.encode())
        }
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

    pub fn with_path(&self, path: UrlPath) -> Self {
        let mut copied = self.clone();
        copied.path = path;
        copied
    }

    pub fn with_body(&self, body: Option<Body>) -> Self {
        let mut copied = self.clone();
        copied.body = body;
        copied
    }
}

/// One backend's answer, after response shaping.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    status_code: u16,
    header: Header,
    body: Option<Body>,
}

impl BackendResponse {
    pub fn new(status_code: u16, header: Header, body: Option<Body>) -> Self {
        Self {
            status_code,
            header,
            body,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn ok(&self) -> bool {
        self.status_code < 400
    }

    pub fn with_header(&self, header: Header) -> Self {
        let mut copied = self.clone();
        copied.header = header;
        copied
    }

    pub fn with_body(&self, body: Option<Body>) -> Self {
        let mut copied = self.clone();
        copied.body = body;
        copied
    }

    /// Serialized form exposed to the resolver as `responses[i]`.
    pub fn to_json(&self) -> Result<Value, GatewayError> {
        let mut map = Map::new();
        map.insert("ok".to_string(), Value::Bool(self.ok()));
        map.insert("statusCode".to_string(), Value::from(self.status_code));
        map.insert("header".to_string(), self.header.to_json());
        let body = match &self.body {
            Some(body) => body.to_json()?,
            None => Value::Null,
        };
        map.insert("body".to_string(), body);
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_request_url_assembly() {
        let request = BackendRequest::new(
            "http://svc:8080/".to_string(),
            UrlPath::new("/users/:id", vec![("id".to_string(), "42".to_string())]),
            "GET".to_string(),
            Header::new(),
            Query::new().add("full", "true"),
            None,
        );
        assert_eq!(request.url(), "http://svc:8080/users/42?full=true");
    }

    #[test]
    fn test_backend_response_to_json() {
        let response = BackendResponse::new(
            200,
            Header::new().add("X-Src", "b1"),
            Some(Body::json(&json!({"a": 1}))),
        );
        let value = response.to_json().unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"]["a"], 1);
    }

    #[test]
    fn test_ok_threshold() {
        assert!(BackendResponse::new(399, Header::new(), None).ok());
        assert!(!BackendResponse::new(400, Header::new(), None).ok());
    }
}
