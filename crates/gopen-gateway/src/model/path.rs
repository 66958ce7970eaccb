//! URL path template with concrete parameters.
//!
//! Combines a raw template (`/users/:id`) with the parameter values
//! extracted for one request, exposing both the raw and rendered forms.

use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlPath {
    template: String,
    params: Vec<(String, String)>,
}

impl UrlPath {
    pub fn new(template: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            template: template.into(),
            params,
        }
    }

    /// The raw template, parameters unexpanded (`/users/:id`).
    pub fn raw(&self) -> &str {
        &self.template
    }

    /// The concrete path with `:name` segments substituted (`/users/42`).
    pub fn rendered(&self) -> String {
        self.template
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => self.param(name).unwrap_or(segment).to_string(),
                None => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn set_param(&self, name: &str, value: &str) -> Self {
        let mut copied = self.clone();
        match copied.params.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => copied.params.push((name.to_string(), value.to_string())),
        }
        copied
    }

    pub fn replace_param(&self, name: &str, value: &str) -> Self {
        if self.param(name).is_some() {
            self.set_param(name, value)
        } else {
            self.clone()
        }
    }

    pub fn del_param(&self, name: &str) -> Self {
        let mut copied = self.clone();
        copied.params.retain(|(k, _)| k != name);
        copied
    }

    /// A template derived from this one: keeps only the parameters that
    /// appear as `:name` segments in `template`.
    pub fn with_template(&self, template: &str) -> Self {
        let params = self
            .params
            .iter()
            .filter(|(name, _)| {
                template
                    .split('/')
                    .any(|segment| segment.strip_prefix(':') == Some(name.as_str()))
            })
            .cloned()
            .collect();
        Self {
            template: template.to_string(),
            params,
        }
    }

    pub fn params_to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.params {
            map.insert(name.clone(), Value::String(value.clone()));
        }
        Value::Object(map)
    }
}
