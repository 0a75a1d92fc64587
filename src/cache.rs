//! LRU cache keyed by chunk or region coordinate
//!
//! Every access stamps the entry with a monotonically increasing counter.
//! When the cache is full, inserting a new key evicts exactly one entry: the
//! one with the smallest stamp. The evicted value is handed back to the caller
//! so it can be persisted.

use std::collections::HashMap;
use std::hash::Hash;

struct Entry<V> {
    value: V,
    stamp: u64,
}

/// LRU cache with explicit access stamps
pub struct LruCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Next stamp to hand out; strictly increasing
    clock: u64,
    /// Maximum number of entries to keep
    capacity: usize,
}

impl<K: Copy + Eq + Hash, V> LruCache<K, V> {
    /// Create a new cache with the given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            clock: 0,
            capacity,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Get an entry, marking it as most recently used
    pub fn get(&mut self, key: K) -> Option<&V> {
        let stamp = self.tick();
        self.entries.get_mut(&key).map(|entry| {
            entry.stamp = stamp;
            &entry.value
        })
    }

    /// Get a mutable entry, marking it as most recently used
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        let stamp = self.tick();
        self.entries.get_mut(&key).map(|entry| {
            entry.stamp = stamp;
            &mut entry.value
        })
    }

    /// Get an entry without touching its stamp
    pub fn peek(&self, key: K) -> Option<&V> {
        self.entries.get(&key).map(|entry| &entry.value)
    }

    /// Insert a value as most recently used.
    ///
    /// # Arguments
    /// * `key` - Key to store under
    /// * `value` - Value to store
    ///
    /// # Returns
    /// The old entry if `key` was already present, or the evicted oldest entry
    /// if a new key was admitted into a full cache. The caller owns it and
    /// decides whether to persist it.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let stamp = self.tick();

        if let Some(entry) = self.entries.get_mut(&key) {
            let old = std::mem::replace(&mut entry.value, value);
            entry.stamp = stamp;
            return Some((key, old));
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(key, Entry { value, stamp });
        evicted
    }

    /// Get an entry as most recently used, creating it with `make` if absent.
    ///
    /// Creating an entry in a full cache evicts the oldest one, which is
    /// returned alongside.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> (&mut V, Option<(K, V)>) {
        let stamp = self.tick();
        let evicted = if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let entry = self.entries.entry(key).or_insert_with(|| Entry { value: make(), stamp });
        entry.stamp = stamp;
        (&mut entry.value, evicted)
    }

    /// Remove an entry
    pub fn remove(&mut self, key: K) -> Option<V> {
        self.entries.remove(&key).map(|entry| entry.value)
    }

    /// Evict the least recently used entry
    pub fn evict_oldest(&mut self) -> Option<(K, V)> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stamp)
            .map(|(key, _)| *key)?;
        self.remove(oldest).map(|value| (oldest, value))
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// Access stamp of a resident entry
    pub fn stamp_of(&self, key: K) -> Option<u64> {
        self.entries.get(&key).map(|entry| entry.stamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Iterate over values without touching stamps
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|entry| &entry.value)
    }

    /// Iterate mutably over values without touching stamps
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut().map(|entry| &mut entry.value)
    }

    /// Remove and yield every entry
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
        self.entries.drain().map(|(key, entry)| (key, entry.value))
    }
}
