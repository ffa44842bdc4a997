//! Bounded time+size cache for tag-parse results.
//!
//! Lookups check expiry before serving. Insertion evicts expired entries
//! first, then (if still over capacity) the oldest half by insertion
//! timestamp. Eviction materializes its iteration order before mutating the
//! map, so a reentrant read mid-eviction never observes a torn iterator.

use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::tags::TagScan;

pub const DEFAULT_CAPACITY: usize = 64;
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    scan: TagScan,
    inserted_at: Instant,
}

/// Size- and age-bounded cache keyed by the exact string handed to the tag
/// scanner.
#[derive(Debug)]
pub struct ParseCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ParseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Serve a cached scan unless the entry has expired; expired entries are
    /// dropped on sight.
    pub fn get(&mut self, key: &str) -> Option<TagScan> {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.inserted_at.elapsed() > self.ttl);
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.scan.clone())
    }

    pub fn insert(&mut self, key: String, scan: TagScan) {
        self.evict_expired();
        if self.entries.len() >= self.capacity {
            self.evict_oldest_half();
        }
        self.entries.insert(
            key,
            CacheEntry {
                scan,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!("parse cache dropped {dropped} expired entries");
        }
    }

    fn evict_oldest_half(&mut self) {
        // Materialize the order first; never mutate while iterating.
        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
        let to_drop = by_age.len().div_ceil(2);
        for (key, _) in by_age.into_iter().take(to_drop) {
            self.entries.remove(&key);
        }
        debug!("parse cache evicted {to_drop} oldest entries over capacity");
    }
}
