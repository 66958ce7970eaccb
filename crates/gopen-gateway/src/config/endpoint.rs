//! Endpoint configuration: the declared surface of the gateway.

use super::backend::Backend;
use super::cache::CacheConfig;
use super::limiter::LimiterConfig;
use crate::model::{ContentEncoding, ContentType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Path template with `:name` parameters, e.g. `/users/:id`.
    pub path: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limiter: Option<LimiterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    /// Statuses that stop the backend loop. Unset = any status >= 400.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_if_status_codes: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<EndpointResponse>,
    #[serde(default)]
    pub beforewares: Vec<String>,
    #[serde(default)]
    pub afterwares: Vec<String>,
    #[serde(default)]
    pub backends: Vec<Backend>,
}

impl Endpoint {
    /// Deadline for the whole pipeline; endpoint value, then the global
    /// value, then 30s.
    pub fn timeout(&self, global_timeout_ms: Option<u64>) -> Duration {
        self.timeout_ms
            .or(global_timeout_ms)
            .map(Duration::from_millis)
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Abort rule: declared codes, or any status >= 400 when undeclared.
    pub fn abort_if(&self, status: u16) -> bool {
        match &self.abort_if_status_codes {
            Some(codes) => codes.contains(&status),
            None => status >= 400,
        }
    }

    /// Backends whose responses take part in composition.
    pub fn non_omit_count(&self) -> usize {
        self.backends.iter().filter(|b| !b.omit_response()).count()
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn count_data_transforms(&self) -> usize {
        let own = self
            .response
            .as_ref()
            .map(|r| r.count_data_transforms())
            .unwrap_or(0);
        own + self
            .backends
            .iter()
            .map(Backend::count_data_transforms)
            .sum::<usize>()
    }

    /// One-line boot summary.
    pub fn resume(&self) -> String {
        format!(
            "{} --> \"{}\" (beforewares:{}, afterwares:{}, backends:{}, transformations:{})",
            self.method,
            self.path,
            self.beforewares.len(),
            self.afterwares.len(),
            self.backends.len(),
            self.count_data_transforms(),
        )
    }
}

/// Target case style for JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nomenclature {
    Camel,
    Snake,
    Pascal,
    Kebab,
}

/// Response-level shaping rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointResponse {
    /// Merge multiple backend bodies into one object instead of a list.
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<ContentEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nomenclature: Option<Nomenclature>,
    #[serde(default)]
    pub omit_empty: bool,
}

impl EndpointResponse {
    pub fn count_data_transforms(&self) -> usize {
        usize::from(self.aggregate)
            + usize::from(self.omit_empty)
            + usize::from(self.content_type.is_some())
            + usize::from(self.nomenclature.is_some())
            + usize::from(self.content_encoding.is_some())
    }
}
