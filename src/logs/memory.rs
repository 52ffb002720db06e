use super::{LogEntry, LogStore};
use crate::Result;
use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::time::Duration;

pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Process-local log store. Entries expire `ttl` after they were written and
/// the least recently used ones are evicted once `max_entries` is reached.
/// Expiry and eviction run in the cache's own batched housekeeping.
pub struct InMemoryLogStore {
    entries: Cache<String, LogEntry>,
}

impl InMemoryLogStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// Live entries, skipping anything already expired.
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn put(&self, entry: LogEntry) -> Result<()> {
        self.entries.insert(entry.key(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<LogEntry>> {
        Ok(self.entries.get(key).await)
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<LogEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry)
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.to_string())
            .collect();

        for key in &keys {
            self.entries.invalidate(key).await;
        }
        Ok(keys.len())
    }
}
