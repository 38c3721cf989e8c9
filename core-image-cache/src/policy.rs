//! Per-request tier selection

use serde::{Deserialize, Serialize};

/// Which cache tiers a single load may read from and write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CachePolicy {
    pub read_memory: bool,
    pub write_memory: bool,
    pub read_disk: bool,
    pub write_disk: bool,
}

impl CachePolicy {
    /// Read and write both tiers.
    pub const DEFAULT: CachePolicy = CachePolicy {
        read_memory: true,
        write_memory: true,
        read_disk: true,
        write_disk: true,
    };

    /// Skip the disk tier entirely.
    pub const MEMORY_ONLY: CachePolicy = CachePolicy {
        read_memory: true,
        write_memory: true,
        read_disk: false,
        write_disk: false,
    };

    /// Skip the memory tier entirely.
    pub const DISK_ONLY: CachePolicy = CachePolicy {
        read_memory: false,
        write_memory: false,
        read_disk: true,
        write_disk: true,
    };

    /// Always fetch, never store.
    pub const NO_CACHE: CachePolicy = CachePolicy {
        read_memory: false,
        write_memory: false,
        read_disk: false,
        write_disk: false,
    };
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
