//! Rate and size limit configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_header_size() -> u64 {
    1024 * 1024 // 1MB
}

fn default_max_body_size() -> u64 {
    3 * 1024 * 1024 // 3MB
}

fn default_max_multipart_memory_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default = "default_max_header_size")]
    pub max_header_size: u64,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: u64,
    #[serde(default = "default_max_multipart_memory_size")]
    pub max_multipart_memory_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<RateConfig>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_header_size: default_max_header_size(),
            max_body_size: default_max_body_size(),
            max_multipart_memory_size: default_max_multipart_memory_size(),
            rate: None,
        }
    }
}

/// Token-bucket rate: `capacity` requests allowed, one token refilled
/// every `every_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    pub capacity: u64,
    pub every_ms: u64,
}

impl RateConfig {
    pub fn every(&self) -> Duration {
        Duration::from_millis(self.every_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: LimiterConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.max_header_size, 1024 * 1024);
        assert_eq!(config.max_body_size, 3 * 1024 * 1024);
        assert_eq!(config.max_multipart_memory_size, 5 * 1024 * 1024);
        assert!(config.rate.is_none());
    }

    #[test]
    fn test_rate_parse() {
        let config: LimiterConfig =
            serde_yaml::from_str("rate:\n  capacity: 2\n  every_ms: 1000\n").unwrap();
        let rate = config.rate.unwrap();
        assert_eq!(rate.capacity, 2);
        assert_eq!(rate.every(), Duration::from_secs(1));
    }
}
