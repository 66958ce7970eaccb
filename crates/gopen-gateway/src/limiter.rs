//! Rate and size limiting, run before dispatch.
//!
//! Rate limiting is a per-client-IP token bucket: `capacity` tokens of
//! burst, one token refilled every `every`. The bucket map is the only
//! process-wide mutable state in the pipeline; it is owned by one
//! `RateLimiter` instance and guarded by a single lock. The map is
//! bounded only by distinct-IP cardinality; multi-instance deployments
//! get best-effort per-instance limiting.

use crate::config::{LimiterConfig, RateConfig};
use crate::error::GatewayError;
use crate::model::{ContentType, HttpRequest};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits or refuses one request from the client identified by the
    /// first `X-Forwarded-For` hop. Buckets are created on first use
    /// under the same lock they are evaluated under.
    pub fn allow_rate(
        &self,
        request: &HttpRequest,
        rate: Option<&RateConfig>,
    ) -> Result<(), GatewayError> {
        let Some(rate) = rate else {
            return Ok(());
        };

        let client_ip = request.client_ip().to_string();
        let capacity = rate.capacity as f64;
        let refill_per_sec = 1.0 / rate.every().as_secs_f64();

        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(client_ip)
            .or_insert_with(|| TokenBucket::new(capacity));

        if bucket.try_acquire(capacity, refill_per_sec) {
            Ok(())
        } else {
            Err(GatewayError::too_many_requests(rate.capacity, rate.every()))
        }
    }
}

/// Enforces the header and body size caps. The body limit switches to
/// the multipart limit for `multipart/form-data` payloads.
pub fn allow_size(request: &HttpRequest, limits: &LimiterConfig) -> Result<(), GatewayError> {
    if request.header().size() > limits.max_header_size {
        return Err(GatewayError::header_too_large(limits.max_header_size));
    }

    let Some(body) = request.body() else {
        return Ok(());
    };
    let max_body_size = if body.content_type() == ContentType::FormData {
        limits.max_multipart_memory_size
    } else {
        limits.max_body_size
    };
    if body.len() as u64 > max_body_size {
        return Err(GatewayError::payload_too_large(max_body_size));
    }
    Ok(())
}
