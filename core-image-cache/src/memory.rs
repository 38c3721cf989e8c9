//! In-memory tier: decoded images under a byte budget with LRU eviction.

use crate::key::CacheKey;
use bridge_traits::image::DecodedImage;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

/// Bounded key → decoded image map.
///
/// Each entry is charged its pixel buffer size (at least one byte). After an
/// insert, least recently used entries are evicted until the total is back
/// within budget, but the tier never evicts its last remaining entry, so a
/// single oversized image is still kept.
pub struct MemoryCache {
    inner: Mutex<MemoryInner>,
    max_size_bytes: u64,
}

struct MemoryInner {
    entries: LruCache<CacheKey, DecodedImage>,
    size_bytes: u64,
}

impl MemoryCache {
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: LruCache::unbounded(),
                size_bytes: 0,
            }),
            max_size_bytes,
        }
    }

    /// Look up an image and mark it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<DecodedImage> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Insert or replace an image, evicting older entries if over budget.
    pub fn put(&self, key: CacheKey, image: DecodedImage) {
        let charge = charge_for(&image);
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.entries.put(key, image) {
            inner.size_bytes -= charge_for(&previous);
        }
        inner.size_bytes += charge;

        while inner.size_bytes > self.max_size_bytes && inner.entries.len() > 1 {
            match inner.entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    let freed = charge_for(&evicted);
                    inner.size_bytes -= freed;
                    debug!(key = %evicted_key, freed_bytes = freed, "Evicted image from memory cache");
                }
                None => break,
            }
        }
    }

    pub fn remove(&self, key: &CacheKey) {
        let mut inner = self.inner.lock();
        if let Some(removed) = inner.entries.pop(key) {
            inner.size_bytes -= charge_for(&removed);
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.size_bytes = 0;
    }

    /// Total bytes currently charged against the budget.
    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().size_bytes
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains(key)
    }
}

fn charge_for(image: &DecodedImage) -> u64 {
    (image.byte_size() as u64).max(1)
}
