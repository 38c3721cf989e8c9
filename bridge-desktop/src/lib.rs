//! # Desktop Bridge Implementations
//!
//! Default implementations of the image bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpImageFetcher` using `reqwest` for URLs and `tokio::fs` for files
//! - `PngImageCodec` using the `image` crate
//! - `default_cache_directory()` using the platform cache directory
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{default_cache_directory, HttpImageFetcher, PngImageCodec};
//! use core_image_cache::ImageCacheManager;
//! use std::sync::Arc;
//!
//! let manager = ImageCacheManager::builder(
//!     default_cache_directory(),
//!     Arc::new(HttpImageFetcher::new()?),
//!     Arc::new(PngImageCodec::new()),
//! )
//! .build();
//! ```

mod codec;
mod fetcher;

use std::path::PathBuf;

pub use codec::{decode_image, PngImageCodec};
pub use fetcher::HttpImageFetcher;

/// Application cache directory for image records.
///
/// Falls back to the system temp directory when the platform has no cache
/// directory.
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("image-cache")
}
