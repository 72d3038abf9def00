//! Query result cache
//!
//! LRU cache with per-entry TTL for search responses, owned by the search
//! service that created it rather than shared process-wide. Entries are
//! keyed on the search mode, knowledge base, top_k and the exact query
//! string.

use crate::search::SearchResponse;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    response: SearchResponse,
    created_at: Instant,
}

/// Cache statistics snapshot
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64 * 100.0
    }
}

/// LRU + TTL cache for search responses
pub struct QueryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
    counters: Mutex<(u64, u64)>,
}

impl QueryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_size: capacity.get(),
            ttl,
            counters: Mutex::new((0, 0)),
        }
    }

    fn key(mode: &str, kb_id: &str, query: &str, top_k: usize) -> String {
        format!("{}:{}:{}:{}", mode, kb_id, top_k, query)
    }

    /// Look up a cached response; expired entries are evicted on access
    pub fn get(
        &self,
        mode: &str,
        kb_id: &str,
        query: &str,
        top_k: usize,
    ) -> Option<SearchResponse> {
        let key = Self::key(mode, kb_id, query, top_k);
        let mut entries = self.entries.lock().ok()?;

        // Popping and reinstating refreshes recency without holding a
        // borrow into the map
        match entries.pop(&key) {
            Some(entry) if entry.created_at.elapsed() <= self.ttl => {
                let response = entry.response.clone();
                entries.put(key.clone(), entry);
                drop(entries);
                self.count(true);
                tracing::debug!("Cache hit: {}", key);
                Some(response)
            }
            Some(_) => {
                drop(entries);
                self.count(false);
                tracing::debug!("Cache entry expired: {}", key);
                None
            }
            None => {
                drop(entries);
                self.count(false);
                None
            }
        }
    }

    /// Store a response; the least recently used entry is evicted when full
    pub fn put(
        &self,
        mode: &str,
        kb_id: &str,
        query: &str,
        top_k: usize,
        response: SearchResponse,
    ) {
        let key = Self::key(mode, kb_id, query, top_k);

        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                CacheEntry {
                    response,
                    created_at: Instant::now(),
                },
            );
        }
    }

    /// Drop all entries and reset counters
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Ok(mut counters) = self.counters.lock() {
            *counters = (0, 0);
        }
        tracing::info!("Query cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.entries.lock().map(|e| e.len()).unwrap_or(0);
        let (hits, misses) = self.counters.lock().map(|c| *c).unwrap_or((0, 0));

        CacheStats {
            size,
            max_size: self.max_size,
            hits,
            misses,
        }
    }

    fn count(&self, hit: bool) {
        if let Ok(mut counters) = self.counters.lock() {
            if hit {
                counters.0 += 1;
            } else {
                counters.1 += 1;
            }
        }
    }
}
