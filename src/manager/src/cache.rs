//! In-memory TTL cache resource.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use flow::Cache;
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryCacheConfig {
    /// Entry lifetime; `0s` disables expiry.
    #[serde(default = "default_ttl")]
    pub ttl: String,
    /// Entry cap; the oldest entry is evicted at the limit. Zero means
    /// unbounded.
    #[serde(default)]
    pub max_entries: usize,
}

fn default_ttl() -> String {
    "5m".to_string()
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            max_entries: 0,
        }
    }
}

struct Entry {
    value: Bytes,
    written: Instant,
}

pub struct MemoryCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MemoryCacheConfig) -> Result<Self, String> {
        let ttl = flow::parse_duration(&config.ttl)?;
        Ok(Self::new(ttl, config.max_entries))
    }

    fn expired(&self, entry: &Entry) -> bool {
        !self.ttl.is_zero() && entry.written.elapsed() > self.ttl
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if self.expired(entry) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Bytes) {
        let mut entries = self.entries.lock().await;
        if self.max_entries > 0 && entries.len() >= self.max_entries && !entries.contains_key(key)
        {
            // Evict the stalest entry to stay within the cap.
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.written)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                written: Instant::now(),
            },
        );
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }
}
