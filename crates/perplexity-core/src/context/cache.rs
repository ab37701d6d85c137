//! Size- and TTL-bounded LRU cache for analysis results

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

pub const DEFAULT_MAX_SIZE_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached value and its bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    /// Length of the value's JSON serialization
    pub size_bytes: usize,
    pub inserted_at: Instant,
}

struct Slot {
    entry: CacheEntry,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    slots: HashMap<String, Slot>,
    total_size: usize,
    tick: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.slots.remove(key)?;
        self.total_size -= slot.entry.size_bytes;
        Some(slot.entry)
    }

    fn evict_lru(&mut self) -> bool {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => self.remove(&key).is_some(),
            None => false,
        }
    }
}

/// Context cache shared by everything that analyzes the workspace
///
/// Constructed once by the host and injected where needed. Entries expire
/// `ttl` after insertion; when the summed entry size would exceed the ceiling
/// the least recently used entries are evicted first.
pub struct ContextCache {
    max_size_bytes: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_BYTES, DEFAULT_TTL)
    }
}

impl ContextCache {
    pub fn new(max_size_bytes: usize, ttl: Duration) -> Self {
        Self {
            max_size_bytes,
            ttl,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`; marks it most recently used
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let expired = match inner.slots.get(key) {
            None => return None,
            Some(slot) => slot.entry.inserted_at.elapsed() >= self.ttl,
        };
        if expired {
            inner.remove(key);
            return None;
        }
        let tick = inner.next_tick();
        let slot = inner.slots.get_mut(key)?;
        slot.last_used = tick;
        Some(slot.entry.value.clone())
    }

    /// Typed variant of [`get`](Self::get); undecodable values count as a miss
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Entry metadata without touching recency
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().slots.get(key).map(|s| s.entry.clone())
    }

    /// Insert or replace `key`
    ///
    /// Returns false when the value alone is larger than the cache ceiling;
    /// the previous value for `key`, if any, is dropped in that case too.
    pub fn set(&self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        let size_bytes = serde_json::to_string(&value).map(|s| s.len()).unwrap_or(usize::MAX);

        let mut inner = self.inner.lock();
        inner.remove(&key);
        if size_bytes > self.max_size_bytes {
            return false;
        }
        while inner.total_size + size_bytes > self.max_size_bytes {
            if !inner.evict_lru() {
                break;
            }
        }

        let tick = inner.next_tick();
        inner.total_size += size_bytes;
        inner.slots.insert(
            key.clone(),
            Slot {
                entry: CacheEntry {
                    key,
                    value,
                    size_bytes,
                    inserted_at: Instant::now(),
                },
                last_used: tick,
            },
        );
        true
    }

    pub fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, v),
            Err(_) => false,
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().remove(key).map(|e| e.value)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.total_size = 0;
    }

    /// Entry count, expired-but-unvisited entries included
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_size(&self) -> usize {
        self.inner.lock().total_size
    }
}

impl std::fmt::Debug for ContextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCache")
            .field("max_size_bytes", &self.max_size_bytes)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .field("total_size", &self.total_size())
            .finish()
    }
}
