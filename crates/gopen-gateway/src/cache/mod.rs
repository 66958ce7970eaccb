//! Fingerprint-keyed response cache.
//!
//! Entries are serialized as gzip-compressed base64; the stored blob is
//! opaque to the store drivers. Concurrent requests for the same miss
//! may each compute and each set; last writer wins.

mod memory;
mod redis;

use crate::codec::compress;
use crate::config::{CacheConfig, Endpoint, StoreConfig};
use crate::model::{Body, ContentEncoding, ContentType, Header, HttpRequest, HttpResponse};
use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Cached response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status_code: u16,
    pub header: Vec<(String, Vec<String>)>,
    pub body: Option<StoredBody>,
    pub duration_secs: u64,
    pub created_at: DateTime<Utc>,
}

/// Body bytes survive storage base64-wrapped, since the declared
/// encoding may make them binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBody {
    pub content_type: ContentType,
    pub content_encoding: ContentEncoding,
    pub data: String,
}

impl CacheEntry {
    pub fn from_response(response: &HttpResponse, duration: Duration) -> Self {
        let body = response.body().map(|body| StoredBody {
            content_type: body.content_type(),
            content_encoding: body.content_encoding(),
            data: base64::engine::general_purpose::STANDARD.encode(body.raw_bytes()),
        });
        Self {
            status_code: response.status_code(),
            header: response
                .header()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
            body,
            duration_secs: duration.as_secs(),
            created_at: Utc::now(),
        }
    }

    pub fn header(&self) -> Header {
        let mut header = Header::new();
        for (key, values) in &self.header {
            for value in values {
                header = header.add(key, value);
            }
        }
        header
    }

    pub fn body(&self) -> Option<Body> {
        self.body.as_ref().and_then(|stored| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&stored.data)
                .ok()?;
            Some(Body::new(
                stored.content_type,
                stored.content_encoding,
                bytes.into(),
            ))
        })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Remaining time to live; zero when expired.
    pub fn remaining_ttl(&self) -> Duration {
        let age = Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default();
        self.duration().saturating_sub(age)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ttl().is_zero()
    }

    /// Rendered for the `X-Gopen-Cache-TTL` header.
    pub fn ttl_string(&self) -> String {
        format!("{}s", self.remaining_ttl().as_secs())
    }

    /// Serializes for storage: JSON → gzip → base64.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).context("Failed to serialize cache entry")?;
        let compressed = compress::compress_gzip(&json)
            .map_err(|e| anyhow::anyhow!("Failed to compress cache entry: {e}"))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
    }

    pub fn decode(blob: &str) -> Result<Self> {
        let compressed = base64::engine::general_purpose::STANDARD
            .decode(blob)
            .context("Failed to base64-decode cache entry")?;
        let json = compress::decompress_gzip(&compressed)
            .map_err(|e| anyhow::anyhow!("Failed to decompress cache entry: {e}"))?;
        serde_json::from_slice(&json).context("Failed to parse cache entry")
    }
}

/// Storage driver seam. Drivers treat blobs as opaque strings and handle
/// their own locking; the pipeline treats them as thread-safe.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn set(&self, key: &str, entry: &CacheEntry) -> Result<()>;
    fn del(&self, key: &str) -> Result<()>;
    fn close(&self) -> Result<()>;
}

/// Builds the configured store: Redis when declared, in-memory otherwise.
pub fn create_store(config: Option<&StoreConfig>) -> Result<Arc<dyn CacheStore>> {
    match config.and_then(|c| c.redis.as_ref()) {
        Some(redis_config) => {
            let store = RedisStore::new(&redis_config.address, &redis_config.password)?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Deterministic cache key: equal request shapes produce equal bytes.
///
/// Built from the method, the path template, the query subset selected
/// by `only_if_queries` (all keys when unset), the header subset
/// selected by `only_if_headers` (none when unset), and the client IP
/// when `per_client_ip` is on. Subsets are sorted so declaration order
/// never leaks into the key.
pub fn fingerprint(endpoint: &Endpoint, cache: &CacheConfig, request: &HttpRequest) -> String {
    let mut parts = vec![
        request.method().to_uppercase(),
        endpoint.path.clone(),
    ];

    let mut query_pairs: Vec<String> = request
        .query()
        .keys()
        .filter(|key| match &cache.only_if_queries {
            Some(keys) => keys.iter().any(|k| k == key),
            None => true,
        })
        .map(|key| format!("{key}={}", request.query().values(key).join(",")))
        .collect();
    query_pairs.sort();
    parts.push(query_pairs.join("&"));

    if let Some(header_keys) = &cache.only_if_headers {
        let mut header_pairs: Vec<String> = header_keys
            .iter()
            .filter_map(|key| {
                request
                    .header()
                    .get(key)
                    .map(|value| format!("{}={}", key.to_lowercase(), value))
            })
            .collect();
        header_pairs.sort();
        parts.push(header_pairs.join("&"));
    }

    if cache.per_client_ip() {
        parts.push(request.client_ip().to_string());
    }

    parts.join(":")
}
