//! CORS policy enforcement.

use crate::config::SecurityCors;
use crate::error::GatewayError;
use crate::model::HttpRequest;

/// Validates the origin (first `X-Forwarded-For` hop), the method, and
/// every inbound header key against the configured allow-lists. Any
/// violation is a 403.
pub fn check(policy: Option<&SecurityCors>, request: &HttpRequest) -> Result<(), GatewayError> {
    let Some(policy) = policy else {
        return Ok(());
    };

    if !policy.allow_origin(request.client_ip()) {
        return Err(GatewayError::forbidden("Origin not allowed"));
    }
    if !policy.allow_method(request.method()) {
        return Err(GatewayError::forbidden("Method not allowed"));
    }
    for key in request.header().keys() {
        if !policy.allow_header(key) {
            return Err(GatewayError::forbidden(format!(
                "Header not allowed: {key}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Header, Query, UrlPath, X_FORWARDED_FOR};

    fn request(ip: &str, method: &str, header_keys: &[&str]) -> HttpRequest {
        let mut header = Header::new().add(X_FORWARDED_FOR, ip);
        for key in header_keys {
            header = header.add(key, "v");
        }
        HttpRequest::new(
            UrlPath::new("/x", vec![]),
            "/x".to_string(),
            method.to_string(),
            header,
            Query::new(),
            None,
        )
    }

    fn policy() -> SecurityCors {
        SecurityCors {
            allow_origins: vec!["10.0.0.1".to_string()],
            allow_methods: vec!["GET".to_string()],
            allow_headers: vec![X_FORWARDED_FOR.to_string(), "Content-Type".to_string()],
        }
    }

    #[test]
    fn test_no_policy_allows_everything() {
        assert!(check(None, &request("1.1.1.1", "DELETE", &["X-Weird"])).is_ok());
    }

    #[test]
    fn test_allowed_request_passes() {
        assert!(check(Some(&policy()), &request("10.0.0.1", "GET", &["Content-Type"])).is_ok());
    }

    #[test]
    fn test_unlisted_origin_rejected() {
        let err = check(Some(&policy()), &request("10.9.9.9", "GET", &[])).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_unlisted_method_rejected() {
        assert!(check(Some(&policy()), &request("10.0.0.1", "POST", &[])).is_err());
    }

    #[test]
    fn test_unlisted_header_rejected() {
        let err = check(Some(&policy()), &request("10.0.0.1", "GET", &["X-Custom"])).unwrap_err();
        assert!(err.message.contains("X-Custom"));
    }
}
