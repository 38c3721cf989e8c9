//! # Image Cache Module
//!
//! Two-tier cache for decoded images with coalesced fetching.
//!
//! ## Overview
//!
//! This module handles:
//! - Stable cache keys derived from the request, size, theme and cache version
//! - A byte-bounded in-memory LRU tier of decoded images
//! - A persistent disk tier with TTL expiry and size trimming
//! - One shared fetch per key for concurrent misses
//! - Hit/miss/fetch/decode statistics
//! - Background preloading, including scroll-driven list preloading
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     ImageCacheManager                  │
//! │  - load()                              │
//! │  - load_from_cache()                   │
//! │  - preload()                           │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> MemoryCache (decoded, LRU)
//!          ├──> DiskCache (encoded, TTL + trim)
//!          ├──> ImageFetcher (host fetch + decode)
//!          └──> ImageCodec (host encode/decode for disk)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_image_cache::{CacheConfig, CachePolicy, ImageCacheManager, ImageModel};
//!
//! let manager = ImageCacheManager::builder(cache_root, fetcher, codec)
//!     .with_config(CacheConfig::new().with_cache_version(CacheConfig::version_for_app("1.4.2", 57)))
//!     .build();
//!
//! let cover = manager
//!     .load(&ImageModel::from("https://example.com/cover.jpg"), None, CachePolicy::DEFAULT)
//!     .await?;
//! ```

pub mod config;
pub mod disk;
pub mod error;
pub mod key;
pub mod manager;
pub mod memory;
pub mod model;
pub mod policy;
pub mod preload;
pub mod stats;

pub use config::{CacheConfig, MemoryBudget};
pub use disk::{DiskCache, DiskEntry};
pub use error::{ImageCacheError, Result};
pub use key::{create_key, CacheKey};
pub use manager::{ImageCacheManager, ImageCacheManagerBuilder};
pub use memory::MemoryCache;
pub use model::{CacheImageModel, ImageModel, ThemeVariant};
pub use policy::CachePolicy;
pub use preload::{preload_window, ListPreloader};
pub use stats::{CacheStats, StatsSnapshot};
