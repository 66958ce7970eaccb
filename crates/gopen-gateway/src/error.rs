//! Error kinds distinguished by the request pipeline.
//!
//! Shaping errors are accumulated and logged rather than aborting the
//! request; errors that prevent producing any response (timeout, panic)
//! short-circuit to the error-body writer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::Location;
use std::time::Duration;
use thiserror::Error;

/// Classification of a pipeline error. Drives the HTTP status the
/// error-body writer responds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed dynamic-value token (e.g. unknown prefix).
    InvalidSyntax,
    /// A dynamic-value path did not resolve. Silently skipped by the
    /// resolver; never written to a response.
    ValueNotFound,
    /// Normal cache miss.
    CacheNotFound,
    TooManyRequests,
    HeaderTooLarge,
    PayloadTooLarge,
    Forbidden,
    Timeout,
    /// Transport failure talking to a backend; synthesized into a 502
    /// history entry.
    BackendTransport,
    Panic,
    /// Body conversion failure; the body is left unchanged.
    ContentConversion,
}

/// A pipeline error with the capture site recorded so the error body can
/// report `file` and `line`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: &'static str,
    pub line: u32,
}

impl GatewayError {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            kind,
            message: message.into(),
            file: location.file(),
            line: location.line(),
        }
    }

    #[track_caller]
    pub fn invalid_syntax(token: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::InvalidSyntax,
            format!("Invalid prefix syntax {}!", token.as_ref()),
        )
    }

    #[track_caller]
    pub fn value_not_found(path: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::ValueNotFound,
            format!("Value not found by path: {}", path.as_ref()),
        )
    }

    #[track_caller]
    pub fn cache_not_found() -> Self {
        Self::new(ErrorKind::CacheNotFound, "Cache not found")
    }

    #[track_caller]
    pub fn too_many_requests(capacity: u64, every: Duration) -> Self {
        Self::new(
            ErrorKind::TooManyRequests,
            format!(
                "Too many requests! Allowed {} requests every {:?}",
                capacity, every
            ),
        )
    }

    #[track_caller]
    pub fn header_too_large(max: u64) -> Self {
        Self::new(
            ErrorKind::HeaderTooLarge,
            format!("Header too large! Max size allowed: {} bytes", max),
        )
    }

    #[track_caller]
    pub fn payload_too_large(max: u64) -> Self {
        Self::new(
            ErrorKind::PayloadTooLarge,
            format!("Payload too large! Max size allowed: {} bytes", max),
        )
    }

    #[track_caller]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    #[track_caller]
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "Gateway timeout! The endpoint deadline was exceeded")
    }

    #[track_caller]
    pub fn backend_transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendTransport, message)
    }

    #[track_caller]
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Panic, message)
    }

    #[track_caller]
    pub fn content_conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContentConversion, message)
    }

    /// HTTP status this error surfaces as when it reaches the writer.
    pub fn status_code(&self) -> u16 {
        match self.kind {
            ErrorKind::TooManyRequests => 429,
            ErrorKind::HeaderTooLarge => 431,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::Forbidden => 403,
            ErrorKind::Timeout => 504,
            ErrorKind::BackendTransport => 502,
            _ => 500,
        }
    }

    pub fn is_value_not_found(&self) -> bool {
        self.kind == ErrorKind::ValueNotFound
    }
}

/// JSON error body written for short-circuited requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub file: String,
    pub line: u32,
    pub endpoint: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    pub fn new(endpoint: &str, err: &GatewayError) -> Self {
        Self {
            file: err.file.to_string(),
            line: err.line,
            endpoint: endpoint.to_string(),
            message: err.message.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_captures_call_site() {
        let err = GatewayError::timeout();
        assert!(err.file.ends_with("error.rs"));
        assert!(err.line > 0);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::too_many_requests(2, Duration::from_secs(1)).status_code(), 429);
        assert_eq!(GatewayError::header_too_large(1024).status_code(), 431);
        assert_eq!(GatewayError::payload_too_large(1024).status_code(), 413);
        assert_eq!(GatewayError::forbidden("Origin not allowed").status_code(), 403);
        assert_eq!(GatewayError::timeout().status_code(), 504);
        assert_eq!(GatewayError::backend_transport("connect refused").status_code(), 502);
        assert_eq!(GatewayError::panic("boom").status_code(), 500);
    }

    #[test]
    fn test_error_body_shape() {
        let err = GatewayError::forbidden("Origin not allowed");
        let body = ErrorBody::new("/users/:id", &err);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["endpoint"], "/users/:id");
        assert_eq!(json["message"], "Origin not allowed");
        assert!(json["file"].as_str().unwrap().ends_with("error.rs"));
    }
}
