//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic hit/miss/fetch/decode counters.
///
/// Each counter is independently atomic; a snapshot taken during concurrent
/// loads may observe counters from slightly different instants.
#[derive(Debug, Default)]
pub struct CacheStats {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    disk_hits: AtomicU64,
    disk_misses: AtomicU64,
    network_fetches: AtomicU64,
    decode_count: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_disk_miss(&self) {
        self.disk_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_decode(&self) {
        self.decode_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters with derived hit rates.
    pub fn snapshot(&self) -> StatsSnapshot {
        let memory_hits = self.memory_hits.load(Ordering::Relaxed);
        let memory_misses = self.memory_misses.load(Ordering::Relaxed);
        let disk_hits = self.disk_hits.load(Ordering::Relaxed);
        let disk_misses = self.disk_misses.load(Ordering::Relaxed);

        StatsSnapshot {
            memory_hits,
            memory_misses,
            disk_hits,
            disk_misses,
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            decode_count: self.decode_count.load(Ordering::Relaxed),
            memory_hit_rate: hit_rate(memory_hits, memory_misses),
            disk_hit_rate: hit_rate(disk_hits, disk_misses),
        }
    }
}

/// Immutable statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub network_fetches: u64,
    pub decode_count: u64,
    /// hits / (hits + misses), 0.0 when nothing was looked up
    pub memory_hit_rate: f64,
    /// hits / (hits + misses), 0.0 when nothing was looked up
    pub disk_hit_rate: f64,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CacheStats::new().snapshot();
        assert_eq!(snapshot, StatsSnapshot::default());
        assert_eq!(snapshot.memory_hit_rate, 0.0);
        assert_eq!(snapshot.disk_hit_rate, 0.0);
    }

    #[test]
    fn test_scripted_counts() {
        let stats = CacheStats::new();
        for _ in 0..3 {
            stats.on_memory_hit();
        }
        stats.on_memory_miss();
        stats.on_disk_hit();
        stats.on_disk_miss();
        stats.on_disk_miss();
        stats.on_disk_miss();
        stats.on_network_fetch();
        stats.on_network_fetch();
        stats.on_decode();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.memory_hits, 3);
        assert_eq!(snapshot.memory_misses, 1);
        assert_eq!(snapshot.disk_hits, 1);
        assert_eq!(snapshot.disk_misses, 3);
        assert_eq!(snapshot.network_fetches, 2);
        assert_eq!(snapshot.decode_count, 1);
        assert_eq!(snapshot.memory_hit_rate, 0.75);
        assert_eq!(snapshot.disk_hit_rate, 0.25);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let stats = CacheStats::new();
        stats.on_memory_hit();
        let before = stats.snapshot();

        stats.on_memory_hit();
        assert_eq!(before.memory_hits, 1);
        assert_eq!(stats.snapshot().memory_hits, 2);
    }

    #[test]
    fn test_only_misses_gives_zero_rate() {
        let stats = CacheStats::new();
        stats.on_disk_miss();
        assert_eq!(stats.snapshot().disk_hit_rate, 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = CacheStats::new();
        stats.on_network_fetch();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["network_fetches"], 1);
        assert_eq!(json["memory_hit_rate"], 0.0);
    }
}
