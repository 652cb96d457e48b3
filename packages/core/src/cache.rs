//! TTL cache for computed responses, keyed by the scope they were built for
//! (e.g. the whole clinic vs. one nurse's caseload).

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub struct ResponseCache<K, V> {
    entries: HashMap<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> ResponseCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Returns the value for `key` only while it is within TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|(_, cached_at)| cached_at.elapsed() <= self.ttl)
            .map(|(value, _)| value.clone())
    }

    pub fn set(&mut self, key: K, value: V) {
        // Expired entries are dropped on write so the map cannot grow
        // without bound across scopes.
        let ttl = self.ttl;
        self.entries.retain(|_, (_, cached_at)| cached_at.elapsed() <= ttl);
        self.entries.insert(key, (value, Instant::now()));
    }

    /// Drop every entry. Called when the underlying data changes.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
