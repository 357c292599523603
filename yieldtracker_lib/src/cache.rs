//! In-memory TTL cache backed by `DashMap` for concurrent access.
//!
//! Holds fetched ticker histories for the lifetime of a session so repeated
//! valuations over the same window do not hit the feed again.

use chrono::NaiveDate;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::feed::TickerHistory;

/// A single cached value with its expiration time.
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe in-memory cache with time-to-live expiration.
///
/// Expired entries are lazily evicted on the next `get` call for that key.
pub struct MemoryCache<V> {
    store: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> MemoryCache<V> {
    /// Creates a new cache with the given time-to-live for entries.
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached value for `key`, or `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.store.get(key)?;
        if Instant::now() > entry.expires_at {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Inserts or overwrites a cache entry. The entry expires after the configured TTL.
    pub fn set(&self, key: String, value: V) {
        self.store.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Removes all entries from the cache.
    pub fn clear(&self) {
        self.store.clear();
    }
}

/// Cache of feed responses keyed by request kind, ticker and range.
pub type HistoryCache = MemoryCache<TickerHistory>;

/// Cache key for a feed request.
pub fn history_key(kind: &str, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{}:{}:{}:{}", kind, ticker, start, end)
}
