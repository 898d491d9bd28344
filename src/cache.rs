//! In-memory TTL cache for successful resolutions.
//!
//! Keys are normalized city queries: leading/trailing whitespace trimmed,
//! internal runs of whitespace collapsed to one space, then lower-cased.
//! Backed by `DashMap`, so lookups for different cities only contend when they
//! land on the same shard, and an entry is always replaced as a whole.
//! Expiry is passive (checked on read). Inserting into a full cache first
//! drops expired entries, then the oldest remaining one.
//!
//! Under concurrent inserts the size bound can be overshot by the number of
//! racing writers; it is a memory guard, not an exact limit.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: Arc<V>,
    inserted_at: Instant,
    expires_at: Instant,
}

/// A TTL- and size-bounded map from normalized query to shared result.
pub struct ResultCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    max_entries: usize,
}

/// Canonical cache key for a city query.
pub fn normalize_key(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl<V> ResultCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a query. Expired entries are removed and reported as a miss.
    pub fn get(&self, query: &str) -> Option<Arc<V>> {
        let key = normalize_key(query);
        let now = Instant::now();

        // The read guard must be released before removing from the same shard.
        let (value, fresh) = {
            let entry = self.entries.get(&key)?;
            (Arc::clone(&entry.value), now < entry.expires_at)
        };

        if fresh {
            Some(value)
        } else {
            self.entries.remove_if(&key, |_, e| e.expires_at <= now);
            None
        }
    }

    /// Store a value under a query, replacing any previous entry.
    pub fn put(&self, query: &str, value: Arc<V>) {
        if self.max_entries == 0 {
            return;
        }
        let key = normalize_key(query);
        let now = Instant::now();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room(now);
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    fn make_room(&self, now: Instant) {
        self.entries.retain(|_, e| e.expires_at > now);

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().inserted_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(%key, "evicting oldest cache entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
