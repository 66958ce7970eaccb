//! Per-endpoint cache rules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// Methods the cache is consulted and populated for. `None` = GET
    /// only. A listed method is consulted even when non-idempotent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if_methods: Option<Vec<String>>,
    /// Statuses worth storing. `None` = any 2xx.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if_status_codes: Option<Vec<u16>>,
    /// Query keys included in the fingerprint. Empty = all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if_queries: Option<Vec<String>>,
    /// Header keys included in the fingerprint. Empty = none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if_headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_client_ip: Option<bool>,
}

impl CacheConfig {
    /// Endpoint config with unset fields filled from the global default
    /// cache config.
    pub fn merged(&self, global: Option<&CacheConfig>) -> CacheConfig {
        let Some(global) = global else {
            return self.clone();
        };
        CacheConfig {
            duration_secs: self.duration_secs.or(global.duration_secs),
            only_if_methods: self.only_if_methods.clone().or_else(|| global.only_if_methods.clone()),
            only_if_status_codes: self
                .only_if_status_codes
                .clone()
                .or_else(|| global.only_if_status_codes.clone()),
            only_if_queries: self.only_if_queries.clone().or_else(|| global.only_if_queries.clone()),
            only_if_headers: self.only_if_headers.clone().or_else(|| global.only_if_headers.clone()),
            per_client_ip: self.per_client_ip.or(global.per_client_ip),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs.unwrap_or(60))
    }

    pub fn allows_method(&self, method: &str) -> bool {
        match &self.only_if_methods {
            Some(methods) => methods.iter().any(|m| m.eq_ignore_ascii_case(method)),
            None => method.eq_ignore_ascii_case("GET"),
        }
    }

    pub fn allows_status(&self, status: u16) -> bool {
        match &self.only_if_status_codes {
            Some(codes) => codes.contains(&status),
            None => (200..300).contains(&status),
        }
    }

    pub fn per_client_ip(&self) -> bool {
        self.per_client_ip.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.duration(), Duration::from_secs(60));
        assert!(config.allows_method("GET"));
        assert!(!config.allows_method("POST"));
        assert!(config.allows_status(204));
        assert!(!config.allows_status(404));
        assert!(!config.per_client_ip());
    }

    #[test]
    fn test_listed_methods_and_statuses() {
        let config = CacheConfig {
            only_if_methods: Some(vec!["POST".to_string()]),
            only_if_status_codes: Some(vec![200, 404]),
            ..Default::default()
        };
        assert!(config.allows_method("post"));
        assert!(!config.allows_method("GET"));
        assert!(config.allows_status(404));
        assert!(!config.allows_status(201));
    }

    #[test]
    fn test_merged_fills_from_global() {
        let global = CacheConfig {
            duration_secs: Some(120),
            per_client_ip: Some(true),
            ..Default::default()
        };
        let endpoint = CacheConfig {
            only_if_methods: Some(vec!["GET".to_string(), "POST".to_string()]),
            ..Default::default()
        };
        let merged = endpoint.merged(Some(&global));
        assert_eq!(merged.duration(), Duration::from_secs(120));
        assert!(merged.per_client_ip());
        assert!(merged.allows_method("POST"));
    }
}
