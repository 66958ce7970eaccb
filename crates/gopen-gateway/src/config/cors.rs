//! CORS security policy.
//!
//! Empty lists allow everything; a populated list is a strict allow-list.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityCors {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default)]
    pub allow_methods: Vec<String>,
    #[serde(default)]
    pub allow_headers: Vec<String>,
}

impl SecurityCors {
    pub fn allow_origin(&self, origin: &str) -> bool {
        self.allow_origins.is_empty() || self.allow_origins.iter().any(|o| o == origin)
    }

    pub fn allow_method(&self, method: &str) -> bool {
        self.allow_methods.is_empty()
            || self.allow_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn allow_header(&self, header_key: &str) -> bool {
        self.allow_headers.is_empty()
            || self.allow_headers.iter().any(|h| h.eq_ignore_ascii_case(header_key))
    }
}
