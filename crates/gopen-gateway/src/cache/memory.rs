//! In-memory TTL cache store.
//!
//! Useful for single-instance deployments and tests. Expired keys are
//! cleaned up opportunistically on write, with the lock already held.

use super::{CacheEntry, CacheStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

pub struct MemoryStore {
    data: Mutex<HashMap<String, (String, SystemTime)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let data = self.data.lock().unwrap();
        match data.get(key) {
            Some((blob, expiry)) if SystemTime::now() < *expiry => {
                Ok(Some(CacheEntry::decode(blob)?))
            }
            _ => Ok(None),
        }
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let blob = entry.encode()?;
        let expiry = SystemTime::now() + entry.duration();
        let mut data = self.data.lock().unwrap();

        if let Some((_, existing_expiry)) = data.get(key) {
            if SystemTime::now() >= *existing_expiry {
                data.remove(key);
            }
        }

        data.insert(key.to_string(), (blob, expiry));
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.remove(key);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Body, Header, HttpResponse};
    use serde_json::json;
    use std::time::Duration;

    fn entry(ttl: Duration) -> CacheEntry {
        let response = HttpResponse::new(
            200,
            Header::new(),
            Some(Body::json(&json!({"cached": true}))),
        );
        CacheEntry::from_response(&response, ttl)
    }

    #[test]
    fn test_get_set_del() {
        let store = MemoryStore::new();
        store.set("key", &entry(Duration::from_secs(60))).unwrap();

        let found = store.get("key").unwrap().unwrap();
        assert_eq!(found.status_code, 200);

        store.del("key").unwrap();
        assert!(store.get("key").unwrap().is_none());
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("absent").unwrap().is_none());
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let store = MemoryStore::new();
        store.set("key", &entry(Duration::ZERO)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get("key").unwrap().is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let store = MemoryStore::new();
        store.set("key", &entry(Duration::from_secs(60))).unwrap();
        let mut second = entry(Duration::from_secs(60));
        second.status_code = 204;
        store.set("key", &second).unwrap();
        assert_eq!(store.get("key").unwrap().unwrap().status_code, 204);
    }
}
