//! Immutable multi-valued query map with copy-on-write mutators.

use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    entries: Vec<(String, Vec<String>)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw query string (`a=1&b=2&b=3`), URL-decoding values.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::new();
        if let Some(raw) = raw {
            for pair in raw.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    let decoded = urlencoding::decode(value).unwrap_or_default().into_owned();
                    query = query.add(key, &decoded);
                } else if !pair.is_empty() {
                    query = query.add(pair, "");
                }
            }
        }
        query
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn add(&self, key: &str, value: &str) -> Self {
        let mut copied = self.clone();
        match copied.position(key) {
            Some(i) => copied.entries[i].1.push(value.to_string()),
            None => copied.entries.push((key.to_string(), vec![value.to_string()])),
        }
        copied
    }

    pub fn append(&self, key: &str, value: &str) -> Self {
        match self.position(key) {
            Some(_) => self.add(key, value),
            None => self.clone(),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Self {
        let mut copied = self.clone();
        match copied.position(key) {
            Some(i) => copied.entries[i].1 = vec![value.to_string()],
            None => copied.entries.push((key.to_string(), vec![value.to_string()])),
        }
        copied
    }

    pub fn replace(&self, key: &str, value: &str) -> Self {
        match self.position(key) {
            Some(_) => self.set(key, value),
            None => self.clone(),
        }
    }

    pub fn del(&self, key: &str) -> Self {
        let mut copied = self.clone();
        if let Some(i) = copied.position(key) {
            copied.entries.remove(i);
        }
        copied
    }

    /// Keeps a key iff `forwarded` is empty, contains `*`, or contains
    /// the key.
    pub fn filter_by_forwarded(&self, forwarded: &[String]) -> Self {
        if forwarded.is_empty() || forwarded.iter().any(|f| f == "*") {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| forwarded.iter().any(|f| f == k))
            .cloned()
            .collect();
        Self { entries }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Last value wins, matching the upstream resolution order.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key)
            .and_then(|i| self.entries[i].1.last())
            .map(String::as_str)
    }

    pub fn values(&self, key: &str) -> &[String] {
        match self.position(key) {
            Some(i) => &self.entries[i].1,
            None => &[],
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders `a=1&b=2` with URL-encoded values, insertion order.
    pub fn encode(&self) -> String {
        let mut parts = Vec::new();
        for (key, values) in &self.entries {
            for value in values {
                parts.push(format!("{}={}", key, urlencoding::encode(value)));
            }
        }
        parts.join("&")
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, values) in &self.entries {
            let value = if values.len() == 1 {
                Value::String(values[0].clone())
            } else {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            };
            map.insert(key.clone(), value);
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decodes_values() {
        let query = Query::parse(Some("name=John&city=New%20York&flag"));
        assert_eq!(query.get("name"), Some("John"));
        assert_eq!(query.get("city"), Some("New York"));
        assert_eq!(query.get("flag"), Some(""));
    }

    #[test]
    fn test_mutators_do_not_alias() {
        let query = Query::new().add("a", "1");
        let before = query.clone();
        let _ = query.add("a", "2");
        let _ = query.del("a");
        assert_eq!(query, before);
    }

    #[test]
    fn test_get_returns_last_value() {
        let query = Query::new().add("a", "1").add("a", "2");
        assert_eq!(query.get("a"), Some("2"));
    }

    #[test]
    fn test_encode_round_trip() {
        let query = Query::new().add("q", "a b").add("x", "1");
        assert_eq!(query.encode(), "q=a%20b&x=1");
    }

    #[test]
    fn test_filter_by_forwarded_keeps_allow_list() {
        let query = Query::new().add("keep", "1").add("drop", "2");
        let filtered = query.filter_by_forwarded(&["keep".to_string()]);
        assert!(filtered.exists("keep"));
        assert!(!filtered.exists("drop"));
    }
}
