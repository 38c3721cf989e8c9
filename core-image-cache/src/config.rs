//! Cache configuration
//!
//! Every field has a usable default and out-of-range values are clamped when
//! resolved, so a `CacheConfig` can never fail to build a cache.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Smallest memory base a fractional budget is computed from.
pub const MIN_AVAILABLE_MEMORY_BYTES: u64 = 16 * MIB;

/// Smallest memory tier a fractional budget resolves to.
pub const MIN_MEMORY_BUDGET_BYTES: u64 = 8 * MIB;

/// How large the memory tier may grow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBudget {
    /// Share of `available_memory_bytes`, in `0.0..=1.0`
    Fraction(f64),
    /// Absolute byte limit
    Bytes(u64),
}

impl Default for MemoryBudget {
    fn default() -> Self {
        MemoryBudget::Fraction(0.20)
    }
}

/// Configuration for the image cache manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache format version, mixed into every key (default: "0")
    pub cache_version: String,

    /// Memory tier budget (default: 20% of available memory)
    pub memory_budget: MemoryBudget,

    /// Memory a fractional budget is taken from (default: 512MB)
    pub available_memory_bytes: u64,

    /// Disk tier size limit (default: 200MB)
    pub disk_max_size_bytes: u64,

    /// Age at which disk records expire; zero disables expiry (default: 14 days)
    #[serde(with = "duration_millis")]
    pub disk_ttl: Duration,

    /// Concurrent decode/encode operations (default: 3)
    pub decode_parallelism: usize,

    /// Emit hit rates after every fetch
    pub log_stats: bool,

    /// Directory name for disk records under the host cache directory
    pub disk_directory_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_version: "0".to_string(),
            memory_budget: MemoryBudget::default(),
            available_memory_bytes: 512 * MIB,
            disk_max_size_bytes: 200 * MIB,
            disk_ttl: Duration::from_secs(14 * 24 * 60 * 60),
            decode_parallelism: 3,
            log_stats: false,
            disk_directory_name: "images".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache version string for an application build.
    pub fn version_for_app(name: &str, code: u64) -> String {
        format!("{}-{}", name, code)
    }

    pub fn with_cache_version(mut self, version: impl Into<String>) -> Self {
        self.cache_version = version.into();
        self
    }

    pub fn with_memory_budget(mut self, budget: MemoryBudget) -> Self {
        self.memory_budget = budget;
        self
    }

    pub fn with_available_memory(mut self, bytes: u64) -> Self {
        self.available_memory_bytes = bytes;
        self
    }

    pub fn with_disk_max_size(mut self, bytes: u64) -> Self {
        self.disk_max_size_bytes = bytes;
        self
    }

    pub fn with_disk_ttl(mut self, ttl: Duration) -> Self {
        self.disk_ttl = ttl;
        self
    }

    pub fn with_decode_parallelism(mut self, count: usize) -> Self {
        self.decode_parallelism = count;
        self
    }

    pub fn with_log_stats(mut self, enabled: bool) -> Self {
        self.log_stats = enabled;
        self
    }

    pub fn with_disk_directory_name(mut self, name: impl Into<String>) -> Self {
        self.disk_directory_name = name.into();
        self
    }

    /// Resolved memory tier size in bytes.
    ///
    /// A fractional budget is taken from at least 16MB of available memory
    /// and never resolves below 8MB. An absolute budget is used as given.
    pub fn memory_cache_size_bytes(&self) -> u64 {
        match self.memory_budget {
            MemoryBudget::Bytes(bytes) => bytes,
            MemoryBudget::Fraction(fraction) => {
                let fraction = if fraction.is_finite() {
                    fraction.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let base = self.available_memory_bytes.max(MIN_AVAILABLE_MEMORY_BYTES);
                ((base as f64 * fraction) as u64).max(MIN_MEMORY_BUDGET_BYTES)
            }
        }
    }

    /// Decode parallelism, never below one.
    pub fn effective_decode_parallelism(&self) -> usize {
        self.decode_parallelism.max(1)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
