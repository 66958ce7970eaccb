//! Request start/finish logging.

use crate::middleware::trace;
use crate::model::HttpRequest;
use std::time::Instant;

pub struct RequestLog {
    start: Instant,
    trace_id: String,
    method: String,
    path: String,
    client_ip: String,
}

impl RequestLog {
    pub fn start(request: &HttpRequest) -> Self {
        let log = Self {
            start: Instant::now(),
            trace_id: trace::trace_id(request).to_string(),
            method: request.method().to_string(),
            path: request.url().to_string(),
            client_ip: request.client_ip().to_string(),
        };
        tracing::info!(
            trace_id = %log.trace_id,
            method = %log.method,
            path = %log.path,
            client_ip = %log.client_ip,
            "Request started"
        );
        log
    }

    pub fn finish(&self, status: u16) {
        tracing::info!(
            trace_id = %self.trace_id,
            method = %self.method,
            path = %self.path,
            client_ip = %self.client_ip,
            status,
            latency_ms = self.start.elapsed().as_millis() as u64,
            "Request finished"
        );
    }
}
