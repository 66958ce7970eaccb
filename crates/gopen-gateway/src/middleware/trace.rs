//! Trace stamping, applied as the request is parsed.
//!
//! Appends the observed client IP to `X-Forwarded-For` and guarantees an
//! `X-Trace-Id` is present, propagating an inbound one.

use crate::model::{HttpRequest, X_FORWARDED_FOR, X_TRACE_ID};
use std::net::IpAddr;
use uuid::Uuid;

pub fn ensure_trace(request: HttpRequest, remote_ip: IpAddr) -> HttpRequest {
    let mut header = request.header().add(X_FORWARDED_FOR, &remote_ip.to_string());
    if header.get_first(X_TRACE_ID).is_none() {
        header = header.set(X_TRACE_ID, &Uuid::new_v4().to_string());
    }
    request.with_header(header)
}

pub fn trace_id(request: &HttpRequest) -> &str {
    request.header().get_first(X_TRACE_ID).unwrap_or("undefined")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Header, Query, UrlPath};

    fn request(header: Header) -> HttpRequest {
        HttpRequest::new(
            UrlPath::new("/x", vec![]),
            "/x".to_string(),
            "GET".to_string(),
            header,
            Query::new(),
            None,
        )
    }

    #[test]
    fn test_appends_forwarded_for_and_generates_trace_id() {
        let stamped = ensure_trace(request(Header::new()), "10.0.0.9".parse().unwrap());
        assert_eq!(stamped.client_ip(), "10.0.0.9");
        assert!(!trace_id(&stamped).is_empty());
        assert_ne!(trace_id(&stamped), "undefined");
    }

    #[test]
    fn test_propagates_existing_trace_id() {
        let header = Header::new().set(X_TRACE_ID, "trace-1");
        let stamped = ensure_trace(request(header), "10.0.0.9".parse().unwrap());
        assert_eq!(trace_id(&stamped), "trace-1");
    }

    #[test]
    fn test_existing_forwarded_for_keeps_first_hop() {
        let header = Header::new().add(X_FORWARDED_FOR, "1.2.3.4");
        let stamped = ensure_trace(request(header), "10.0.0.9".parse().unwrap());
        assert_eq!(stamped.client_ip(), "1.2.3.4");
        assert_eq!(stamped.header().values(X_FORWARDED_FOR), ["1.2.3.4", "10.0.0.9"]);
    }
}
