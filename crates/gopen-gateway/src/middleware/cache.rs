//! Cache gate: short-circuits the pipeline on a hit, stores cacheable
//! responses after composition.

use crate::cache::{fingerprint, CacheEntry, CacheStore};
use crate::config::{CacheConfig, Endpoint};
use crate::model::{HttpRequest, HttpResponse, X_GOPEN_CACHE, X_GOPEN_CACHE_TTL};
use std::sync::Arc;

pub struct CacheMiddleware {
    store: Arc<dyn CacheStore>,
}

impl CacheMiddleware {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cache lookup. `None` continues the pipeline: the endpoint has no
    /// cache, the method is not listed, the key is absent, or the entry
    /// expired. Store drivers block, so calls hop through
    /// `spawn_blocking`.
    pub async fn read(
        &self,
        endpoint: &Endpoint,
        cache: &CacheConfig,
        request: &HttpRequest,
    ) -> Option<HttpResponse> {
        if !cache.allows_method(request.method()) {
            return None;
        }
        let key = fingerprint(endpoint, cache, request);

        let store = Arc::clone(&self.store);
        let lookup_key = key.clone();
        let entry = tokio::task::spawn_blocking(move || store.get(&lookup_key))
            .await
            .ok()?
            .unwrap_or_else(|err| {
                tracing::warn!(key = %key, error = %err, "Cache lookup failed");
                None
            })?;

        if entry.is_expired() {
            return None;
        }
        tracing::debug!(key = %key, ttl = %entry.ttl_string(), "Cache hit");

        let header = entry
            .header()
            .set(X_GOPEN_CACHE, "true")
            .set(X_GOPEN_CACHE_TTL, &entry.ttl_string());
        Some(HttpResponse::new(entry.status_code, header, entry.body()))
    }

    /// Stores the composed response when the method and status are
    /// cacheable and a body is present. Concurrent misses may each
    /// store; last writer wins.
    pub async fn write(
        &self,
        endpoint: &Endpoint,
        cache: &CacheConfig,
        request: &HttpRequest,
        response: &HttpResponse,
    ) {
        if !cache.allows_method(request.method())
            || !cache.allows_status(response.status_code())
            || response.body().is_none()
        {
            return;
        }
        let key = fingerprint(endpoint, cache, request);
        let entry = CacheEntry::from_response(response, cache.duration());

        let store = Arc::clone(&self.store);
        let store_key = key.clone();
        let result = tokio::task::spawn_blocking(move || store.set(&store_key, &entry)).await;
        match result {
            Ok(Ok(())) => tracing::debug!(key = %key, "Cache stored"),
            Ok(Err(err)) => tracing::warn!(key = %key, error = %err, "Cache store failed"),
            Err(err) => tracing::warn!(key = %key, error = %err, "Cache store task failed"),
        }
    }
}
