//! Redis cache store, for multi-instance deployments.
//!
//! Uses a blocking client behind an r2d2 pool; async call sites hop
//! through `spawn_blocking`. TTL is enforced server-side with SETEX.

use super::{CacheEntry, CacheStore};
use anyhow::{Context, Result};
use redis::{Commands, Connection};
use std::sync::Mutex;

struct RedisConnectionManager {
    client: redis::Client,
}

impl r2d2::ManageConnection for RedisConnectionManager {
    type Connection = Mutex<Connection>;
    type Error = redis::RedisError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = self.client.get_connection()?;
        Ok(Mutex::new(conn))
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        redis::cmd("PING").query(conn.get_mut().unwrap())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub struct RedisStore {
    pool: r2d2::Pool<RedisConnectionManager>,
}

impl RedisStore {
    pub fn new(address: &str, password: &str) -> Result<Self> {
        let url = if password.is_empty() {
            format!("redis://{address}")
        } else {
            format!("redis://:{password}@{address}")
        };
        let client = redis::Client::open(url).context("Failed to parse Redis address")?;

        let pool = r2d2::Pool::builder()
            .max_size(8)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(RedisConnectionManager { client })
            .context("Failed to create Redis connection pool")?;

        // Fail at boot, not on the first request.
        {
            let conn = pool.get().context("Failed to get connection from pool")?;
            let _: String = redis::cmd("PING")
                .query(&mut *conn.lock().unwrap())
                .context("Failed to PING Redis")?;
        }

        tracing::info!(address, "Connected to Redis cache store");
        Ok(Self { pool })
    }
}

impl CacheStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;
        let blob: Option<String> = conn
            .lock()
            .unwrap()
            .get(key)
            .context("Redis GET failed")?;
        match blob {
            Some(blob) => Ok(Some(CacheEntry::decode(&blob)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let blob = entry.encode()?;
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(entry.duration().as_secs())
            .arg(blob)
            .query(&mut *conn.lock().unwrap())
            .context("Redis SETEX failed")?;
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .context("Failed to get Redis connection from pool")?;
        let _: () = conn
            .lock()
            .unwrap()
            .del(key)
            .context("Redis DEL failed")?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
