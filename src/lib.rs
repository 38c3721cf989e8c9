//! Workspace façade crate.
//!
//! Re-exports the image cache and its bridge contracts so host applications
//! can depend on `image-cache-workspace` alone. The `desktop-shims` feature
//! (on by default) adds ready-made desktop wiring.

pub use bridge_traits as bridge;
pub use core_image_cache as cache;
pub use core_runtime as runtime;

/// Desktop wiring: HTTP/file fetcher, PNG disk codec, platform cache directory.
#[cfg(feature = "desktop-shims")]
pub mod desktop {
    use core_image_cache::{CacheConfig, ImageCacheManager};
    use std::path::PathBuf;
    use std::sync::Arc;

    pub use bridge_desktop::{decode_image, default_cache_directory, HttpImageFetcher, PngImageCodec};

    /// Build a cache manager rooted in the platform cache directory.
    pub fn manager(config: CacheConfig) -> bridge_traits::Result<ImageCacheManager> {
        manager_in(default_cache_directory(), config)
    }

    /// Build a cache manager rooted in `cache_root`.
    pub fn manager_in(
        cache_root: impl Into<PathBuf>,
        config: CacheConfig,
    ) -> bridge_traits::Result<ImageCacheManager> {
        let fetcher = Arc::new(HttpImageFetcher::new()?);
        Ok(
            ImageCacheManager::builder(cache_root, fetcher, Arc::new(PngImageCodec::new()))
                .with_config(config)
                .build(),
        )
    }

}
