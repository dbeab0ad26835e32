//! Block cache for segment files.
//!
//! Caches whole 32KB blocks so repeated positional reads of the same
//! region skip the disk. Only full blocks are cached; the partially
//! written tail block of the active segment is always read from disk.

use std::sync::Arc;

use bytes::Bytes;

use super::lru::{CacheStats, LruCache};
use crate::chunk::BLOCK_SIZE;

/// Block cache keyed by segment id and block number.
///
/// The key packs the segment id into the upper 32 bits of a `u64` and
/// the block number into the lower 32 bits.
pub struct BlockCache {
    cache: LruCache<u64, Bytes>,
}

impl BlockCache {
    /// Create a block cache holding up to `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Create a block cache from a byte budget, rounding the capacity up
    /// to whole blocks.
    pub fn with_byte_budget(bytes: u32) -> Self {
        let mut capacity = bytes / BLOCK_SIZE;
        if bytes % BLOCK_SIZE != 0 {
            capacity += 1;
        }
        Self::new(capacity as usize)
    }

    fn cache_key(segment_id: u32, block_number: u32) -> u64 {
        (segment_id as u64) << 32 | block_number as u64
    }

    /// Get a block from the cache.
    pub fn get(&self, segment_id: u32, block_number: u32) -> Option<Bytes> {
        self.cache.get(&Self::cache_key(segment_id, block_number))
    }

    /// Insert a block into the cache.
    pub fn insert(&self, segment_id: u32, block_number: u32, block: Bytes) {
        self.cache
            .insert(Self::cache_key(segment_id, block_number), block);
    }

    /// Get the number of cached blocks.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        self.cache.stats()
    }

    /// Clear all cached blocks.
    pub fn clear(&self) {
        self.cache.clear();
    }
}
