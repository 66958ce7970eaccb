//! Configuration types for the gateway.
//!
//! The document (JSON or YAML) maps onto [`Gopen`]; `validate` rejects
//! inconsistent configs at boot so they can never fail at request time.

mod backend;
mod cache;
mod cors;
mod endpoint;
mod limiter;

use anyhow::{bail, Context};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub use backend::{
    Backend, BackendRequestConfig, BackendResponseConfig, Modifier, ModifierAction,
    ModifierContext, ModifierScope, Projection,
};
pub use cache::CacheConfig;
pub use cors::SecurityCors;
pub use endpoint::{Endpoint, EndpointResponse, Nomenclature};
pub use limiter::{LimiterConfig, RateConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gopen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Global pipeline deadline; endpoints may override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Global limits; endpoints may override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limiter: Option<LimiterConfig>,
    /// Default cache rules merged under endpoint cache configs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_cors: Option<SecurityCors>,
    /// Default key case style applied when an endpoint response declares
    /// none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nomenclature: Option<Nomenclature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,
    /// Named middleware backends referenced by endpoint
    /// beforewares/afterwares.
    #[serde(default)]
    pub middlewares: HashMap<String, Backend>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub address: String,
    #[serde(default)]
    pub password: String,
}

impl Gopen {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let gopen: Gopen = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).context("Failed to parse JSON config")?
        } else {
            serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
        };
        gopen.validate()?;
        Ok(gopen)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            let route = (endpoint.method.to_uppercase(), endpoint.path.clone());
            if !seen.insert(route) {
                bail!(
                    "Duplicate endpoint declared: {} \"{}\"",
                    endpoint.method,
                    endpoint.path
                );
            }
            if endpoint.backends.is_empty() {
                bail!(
                    "Endpoint {} \"{}\" declares no backends",
                    endpoint.method,
                    endpoint.path
                );
            }
            for name in endpoint.beforewares.iter().chain(&endpoint.afterwares) {
                if !self.middlewares.contains_key(name) {
                    bail!(
                        "Endpoint {} \"{}\" references unknown middleware \"{}\"",
                        endpoint.method,
                        endpoint.path,
                        name
                    );
                }
            }
            self.validate_backends(endpoint)?;
        }
        for (name, middleware) in &self.middlewares {
            if middleware.hosts.is_empty() {
                bail!("Middleware \"{}\" declares no hosts", name);
            }
        }
        Ok(())
    }

    fn validate_backends(&self, endpoint: &Endpoint) -> Result<(), anyhow::Error> {
        // Execution order as seen by the history: beforewares, then the
        // backend list, then afterwares.
        let execution_order: Vec<&Backend> = endpoint
            .beforewares
            .iter()
            .filter_map(|name| self.middlewares.get(name))
            .chain(endpoint.backends.iter())
            .chain(
                endpoint
                    .afterwares
                    .iter()
                    .filter_map(|name| self.middlewares.get(name)),
            )
            .collect();

        for (index, backend) in execution_order.iter().enumerate() {
            if backend.hosts.is_empty() {
                bail!(
                    "Backend \"{}\" of endpoint \"{}\" declares no hosts",
                    backend.path,
                    endpoint.path
                );
            }
            if let Some(response) = &backend.response {
                if response.projection.as_ref().is_some_and(Projection::is_mixed) {
                    bail!(
                        "Backend \"{}\" of endpoint \"{}\" mixes include and exclude projection modes",
                        backend.path,
                        endpoint.path
                    );
                }
            }
            let modifiers = backend
                .request
                .iter()
                .flat_map(|r| r.modifiers.iter())
                .chain(backend.response.iter().flat_map(|r| r.modifiers.iter()));
            for modifier in modifiers {
                for referenced in history_references(&modifier.value) {
                    if referenced >= index {
                        bail!(
                            "Modifier \"{}\" of backend \"{}\" references responses[{}], but only \
                             indices below {} exist when it runs",
                            modifier.key,
                            backend.path,
                            referenced,
                            index
                        );
                    }
                }
            }
        }
        Ok(())
    }

    pub fn count_backends(&self) -> usize {
        self.endpoints
            .iter()
            .map(|e| e.beforewares.len() + e.backends.len() + e.afterwares.len())
            .sum()
    }
}

/// History indices referenced by `#responses[i]` / `#responses.i` tokens.
fn history_references(value: &str) -> Vec<usize> {
    let regex = Regex::new(r"#responses[\[.](\d+)").expect("valid reference regex");
    regex
        .captures_iter(value)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}
