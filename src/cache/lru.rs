//! LRU cache implementation.
//!
//! A thread-safe LRU cache with a fixed entry capacity. Nodes live in a
//! vector and link to each other by index, so the recency list needs no
//! pointer juggling.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Statistics for cache operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: AtomicU64,
    /// Number of cache misses.
    pub misses: AtomicU64,
    /// Number of insertions.
    pub inserts: AtomicU64,
    /// Number of evictions.
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Create new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// A node in the recency list.
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LruInner<K, V> {
    capacity: usize,
    /// Map from key to node index.
    map: HashMap<K, usize>,
    /// Node storage; freed slots are recycled through `free`.
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone, V: Clone> LruInner<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// Unlink a node from the recency list.
    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().unwrap();
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.nodes[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    /// Link a node at the head of the recency list.
    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.nodes[idx].as_mut().unwrap();
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.nodes[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let idx = *self.map.get(key)?;
        if self.head != Some(idx) {
            self.detach(idx);
            self.attach_front(idx);
        }
        Some(self.nodes[idx].as_ref().unwrap().value.clone())
    }

    /// Insert a value. Returns true if an entry was evicted.
    fn insert(&mut self, key: K, value: V) -> bool {
        if let Some(&idx) = self.map.get(&key) {
            self.nodes[idx].as_mut().unwrap().value = value;
            if self.head != Some(idx) {
                self.detach(idx);
                self.attach_front(idx);
            }
            return false;
        }

        let evicted = if self.map.len() >= self.capacity {
            if let Some(tail) = self.tail {
                let key = self.nodes[tail].as_ref().unwrap().key.clone();
                self.remove(&key);
                true
            } else {
                false
            }
        } else {
            false
        };

        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.nodes.push(None);
                self.nodes.len() - 1
            }
        };
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.attach_front(idx);
        self.map.insert(key, idx);

        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.detach(idx);
        let node = self.nodes[idx].take().unwrap();
        self.free.push(idx);
        Some(node.value)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }
}

/// A thread-safe LRU cache with a fixed entry capacity.
pub struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
    stats: Arc<CacheStats>,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// Create a new cache holding up to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner::new(capacity)),
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Get a value from the cache, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let result = self.inner.lock().get(key);

        if result.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }

        result
    }

    /// Insert a value into the cache.
    ///
    /// Returns true if an entry was evicted.
    pub fn insert(&self, key: K, value: V) -> bool {
        let evicted = self.inner.lock().insert(key, value);

        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }

        evicted
    }

    /// Remove a value from the cache.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().remove(key)
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
