//! Backend configuration: one hop in an endpoint's composition.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    /// Ordered host list; requests rotate through it round-robin.
    pub hosts: Vec<String>,
    pub path: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<BackendRequestConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<BackendResponseConfig>,
    #[serde(skip, default)]
    host_cursor: Arc<AtomicUsize>,
}

impl Backend {
    /// Next host in rotation; a single-host list always returns it.
    pub fn balanced_host(&self) -> &str {
        let i = self.host_cursor.fetch_add(1, Ordering::Relaxed);
        &self.hosts[i % self.hosts.len()]
    }

    pub fn group_response_as(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.group_response_as.as_deref())
    }

    pub fn omit_response(&self) -> bool {
        self.response.as_ref().is_some_and(|r| r.omit)
    }

    /// Number of declarative transforms, reported in the boot summary.
    pub fn count_data_transforms(&self) -> usize {
        let mut count = 0;
        if let Some(request) = &self.request {
            count += request.modifiers.len();
            count += usize::from(request.omit_header)
                + usize::from(request.omit_query)
                + usize::from(request.omit_body);
        }
        if let Some(response) = &self.response {
            count += response.modifiers.len() + response.omit_body_fields.len();
            count += usize::from(response.projection.is_some())
                + response.mapping.len()
                + usize::from(response.group_response_as.is_some());
        }
        count
    }

    #[cfg(test)]
    pub fn for_tests(host: &str, path: &str, method: &str) -> Self {
        Self {
            hosts: vec![host.to_string()],
            path: path.to_string(),
            method: method.to_string(),
            request: None,
            response: None,
            host_cursor: Arc::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendRequestConfig {
    #[serde(default)]
    pub omit_header: bool,
    #[serde(default)]
    pub omit_query: bool,
    #[serde(default)]
    pub omit_body: bool,
    /// Header allow-list forwarded to the backend. Empty or `*` = all.
    #[serde(default)]
    pub forward_headers: Vec<String>,
    /// Query allow-list forwarded to the backend. Empty or `*` = all.
    #[serde(default)]
    pub forward_queries: Vec<String>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendResponseConfig {
    /// Excludes this response from status/body composition; the backend
    /// still executes for side effects.
    #[serde(default)]
    pub omit: bool,
    #[serde(default)]
    pub omit_header: bool,
    #[serde(default)]
    pub omit_body: bool,
    /// Body paths removed before composition.
    #[serde(default)]
    pub omit_body_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    /// Key renames `from → to`, applied to body paths.
    #[serde(default)]
    pub mapping: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_response_as: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierContext {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierScope {
    Header,
    Query,
    Param,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierAction {
    Add,
    Append,
    Set,
    Replace,
    Delete,
}

/// Declarative mutation of a request or response field. `value` may
/// contain dynamic-value tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modifier {
    pub context: ModifierContext,
    pub scope: ModifierScope,
    pub action: ModifierAction,
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Body projection: `{"path": 1}` includes, `{"path": 0}` excludes.
/// Modes are mutually exclusive, enforced by config validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    entries: Vec<(String, u8)>,
}

impl Projection {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn is_include(&self) -> bool {
        self.entries.iter().all(|(_, mode)| *mode == 1)
    }

    pub fn is_exclude(&self) -> bool {
        self.entries.iter().all(|(_, mode)| *mode == 0)
    }

    pub fn is_mixed(&self) -> bool {
        !self.entries.is_empty() && !self.is_include() && !self.is_exclude()
    }

    #[cfg(test)]
    pub fn from_entries(entries: Vec<(&str, u8)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(path, mode)| (path.to_string(), mode))
                .collect(),
        }
    }
}

impl Serialize for Projection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, mode) in &self.entries {
            map.serialize_entry(path, mode)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Projection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ProjectionVisitor;

        impl<'de> Visitor<'de> for ProjectionVisitor {
            type Value = Projection;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of JSONPath to 0 (exclude) or 1 (include)")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((path, mode)) = access.next_entry::<String, u8>()? {
                    if mode > 1 {
                        return Err(serde::de::Error::custom(
                            "projection values must be 0 or 1",
                        ));
                    }
                    entries.push((path, mode));
                }
                Ok(Projection { entries })
            }
        }

        deserializer.deserialize_map(ProjectionVisitor)
    }
}
