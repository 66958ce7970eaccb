//! Immutable multi-valued header map.
//!
//! Lookup is case-insensitive; the original key casing is preserved on
//! emit. Every mutator returns a new instance, so sharing a `Header`
//! across tasks is always safe.

use serde_json::Value;

pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";
pub const X_TRACE_ID: &str = "X-Trace-Id";
pub const X_GOPEN_CACHE: &str = "X-Gopen-Cache";
pub const X_GOPEN_CACHE_TTL: &str = "X-Gopen-Cache-TTL";
pub const X_GOPEN_SUCCESS: &str = "X-Gopen-Success";
pub const X_GOPEN_COMPLETE: &str = "X-Gopen-Complete";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<(String, Vec<String>)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut header = Self::new();
        for (key, value) in pairs {
            header = header.add(&key.into(), &value.into());
        }
        header
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// Appends a value under `key`, creating the key when absent.
    pub fn add(&self, key: &str, value: &str) -> Self {
        let mut copied = self.clone();
        match copied.position(key) {
            Some(i) => copied.entries[i].1.push(value.to_string()),
            None => copied.entries.push((key.to_string(), vec![value.to_string()])),
        }
        copied
    }

    /// Appends a value under `key` only when the key already exists.
    pub fn append(&self, key: &str, value: &str) -> Self {
        match self.position(key) {
            Some(_) => self.add(key, value),
            None => self.clone(),
        }
    }

    /// Replaces all values of `key` with a single value.
    pub fn set(&self, key: &str, value: &str) -> Self {
        let mut copied = self.clone();
        match copied.position(key) {
            Some(i) => copied.entries[i].1 = vec![value.to_string()],
            None => copied.entries.push((key.to_string(), vec![value.to_string()])),
        }
        copied
    }

    /// Replaces all values of `key` only when the key already exists.
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
    /// the key (case-insensitive).
    pub fn filter_by_forwarded(&self, forwarded: &[String]) -> Self {
        if forwarded.is_empty() || forwarded.iter().any(|f| f == "*") {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| forwarded.iter().any(|f| f.eq_ignore_ascii_case(k)))
            .cloned()
            .collect();
        Self { entries }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// All values of `key` joined with ", " (HTTP list form).
    pub fn get(&self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.entries[i].1.join(", "))
    }

    pub fn get_first(&self, key: &str) -> Option<&str> {
        self.position(key)
            .and_then(|i| self.entries[i].1.first())
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialized size in bytes, as counted against the header limit:
    /// `key: v1, v2\r\n` per entry.
    pub fn size(&self) -> u64 {
        self.entries
            .iter()
            .map(|(k, values)| {
                let values_len: usize =
                    values.iter().map(String::len).sum::<usize>() + 2 * values.len().saturating_sub(1);
                (k.len() + 2 + values_len + 2) as u64
            })
            .sum()
    }

    /// JSON object form used by the dynamic-value resolver: single-valued
    /// keys flatten to a string, multi-valued keys stay arrays.
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
