//! # Image Cache Manager
//!
//! Coordinates the memory tier, the disk tier and the host fetch capability.
//!
//! A load walks the tiers in order and stops at the first hit:
//!
//! ```text
//! load(model, size, policy)
//!    │
//!    ├─► memory  (read_memory)  ── hit ──► image
//!    │
//!    ├─► disk    (read_disk)    ── hit ──► decode ──► memory (write_memory) ──► image
//!    │
//!    └─► in-flight table ── joined ──────────────────────────────► shared result
//!              │
//!              └─ new ──► fetch task: fetch ──► encode ──► disk (write_disk)
//!                                                  └──► memory (write_memory)
//! ```
//!
//! Concurrent misses for one key share a single fetch. The fetch runs in its
//! own task, so a requester that stops waiting does not cancel it for the
//! others. The first requester's policy decides which tiers the shared fetch
//! writes.

use crate::config::CacheConfig;
use crate::disk::{DiskCache, DiskEntry};
use crate::error::{ImageCacheError, Result};
use crate::key::{create_key, CacheKey};
use crate::memory::MemoryCache;
use crate::model::{ImageModel, ThemeVariant};
use crate::policy::CachePolicy;
use crate::stats::{CacheStats, StatsSnapshot};
use bridge_traits::image::{DecodedImage, FetchRequest, ImageCodec, ImageFetcher, TargetSize};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

type SharedFetch = Shared<BoxFuture<'static, Result<DecodedImage>>>;

struct InFlight {
    id: u64,
    future: SharedFetch,
}

struct ManagerInner {
    config: CacheConfig,
    memory: Arc<MemoryCache>,
    disk: Arc<DiskCache>,
    fetcher: Arc<dyn ImageFetcher>,
    codec: Arc<dyn ImageCodec>,
    stats: Arc<CacheStats>,
    codec_permits: Semaphore,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    next_fetch_id: AtomicU64,
    theme: RwLock<ThemeVariant>,
    runtime: Option<Handle>,
}

/// Two-tier image cache with coalesced fetching.
///
/// Cloning is cheap and every clone shares the same tiers, statistics and
/// in-flight table.
#[derive(Clone)]
pub struct ImageCacheManager {
    inner: Arc<ManagerInner>,
}

impl ImageCacheManager {
    /// Create a manager over existing tiers.
    ///
    /// Background tasks are spawned on the Tokio runtime current at
    /// construction, if any. Use [`ImageCacheManagerBuilder::with_runtime`]
    /// to pick one explicitly.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let manager = ImageCacheManager::new(
    ///     config,
    ///     Arc::new(MemoryCache::new(64 * 1024 * 1024)),
    ///     Arc::new(DiskCache::new(dir, 200 * 1024 * 1024, ttl, clock)),
    ///     fetcher,
    ///     codec,
    ///     Arc::new(CacheStats::new()),
    /// );
    /// ```
    pub fn new(
        config: CacheConfig,
        memory: Arc<MemoryCache>,
        disk: Arc<DiskCache>,
        fetcher: Arc<dyn ImageFetcher>,
        codec: Arc<dyn ImageCodec>,
        stats: Arc<CacheStats>,
    ) -> Self {
        Self::with_parts(
            config,
            memory,
            disk,
            fetcher,
            codec,
            stats,
            Handle::try_current().ok(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn with_parts(
        config: CacheConfig,
        memory: Arc<MemoryCache>,
        disk: Arc<DiskCache>,
        fetcher: Arc<dyn ImageFetcher>,
        codec: Arc<dyn ImageCodec>,
        stats: Arc<CacheStats>,
        runtime: Option<Handle>,
    ) -> Self {
        let codec_permits = Semaphore::new(config.effective_decode_parallelism());

        info!(
            version = %config.cache_version,
            memory_max_bytes = memory.max_size_bytes(),
            disk_max_bytes = disk.max_size_bytes(),
            decode_parallelism = config.effective_decode_parallelism(),
            "Image cache manager created"
        );

        Self {
            inner: Arc::new(ManagerInner {
                config,
                memory,
                disk,
                fetcher,
                codec,
                stats,
                codec_permits,
                in_flight: Mutex::new(HashMap::new()),
                next_fetch_id: AtomicU64::new(0),
                theme: RwLock::new(ThemeVariant::default()),
                runtime,
            }),
        }
    }

    /// Start building a manager whose tiers are derived from a `CacheConfig`.
    ///
    /// Disk records live in `cache_root/<disk_directory_name>`.
    pub fn builder(
        cache_root: impl Into<PathBuf>,
        fetcher: Arc<dyn ImageFetcher>,
        codec: Arc<dyn ImageCodec>,
    ) -> ImageCacheManagerBuilder {
        ImageCacheManagerBuilder {
            cache_root: cache_root.into(),
            fetcher,
            codec,
            config: CacheConfig::default(),
            clock: None,
            stats: None,
            runtime: None,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Set the theme variant mixed into keys of subsequent loads.
    pub fn set_theme_variant(&self, theme: ThemeVariant) {
        *self.inner.theme.write() = theme;
    }

    pub fn theme_variant(&self) -> ThemeVariant {
        *self.inner.theme.read()
    }

    /// Key a load with these arguments would use right now.
    pub fn key_for(&self, model: &ImageModel, size: Option<TargetSize>) -> CacheKey {
        create_key(
            model,
            size,
            self.theme_variant(),
            &self.inner.config.cache_version,
        )
    }

    /// Load an image through the cache.
    ///
    /// Tiers excluded by `policy` are neither read nor written, and record no
    /// hits or misses. On a full miss the image is fetched once per key no
    /// matter how many callers are waiting for it.
    ///
    /// A caller that joins a fetch already in flight gets its result, but the
    /// tiers written are those of the first caller's `policy`.
    #[instrument(skip(self, model, policy), fields(model = %model))]
    pub async fn load(
        &self,
        model: &ImageModel,
        size: Option<TargetSize>,
        policy: CachePolicy,
    ) -> Result<DecodedImage> {
        let key = self.key_for(model, size);

        if let Some(image) = self.inner.lookup(&key, policy).await {
            return Ok(image);
        }

        self.fetch_coalesced(key, model.to_fetch_request(size), policy)
            .await
    }

    /// Load an image from the cache tiers only, never fetching.
    pub async fn load_from_cache(
        &self,
        model: &ImageModel,
        size: Option<TargetSize>,
        policy: CachePolicy,
    ) -> Option<DecodedImage> {
        let key = self.key_for(model, size);
        self.inner.lookup(&key, policy).await
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn memory_cache(&self) -> &Arc<MemoryCache> {
        &self.inner.memory
    }

    pub fn disk_cache(&self) -> &Arc<DiskCache> {
        &self.inner.disk
    }

    /// Number of keys with a fetch currently running.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub fn clear_memory(&self) {
        self.inner.memory.clear();
        info!("Memory cache cleared");
    }

    pub async fn clear_disk(&self) {
        let disk = self.inner.disk.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || disk.clear()).await {
            warn!(error = %e, "Disk cache clear task failed");
        }
    }

    /// Drop the cached image for a request from both tiers.
    pub async fn evict(&self, model: &ImageModel, size: Option<TargetSize>) {
        let key = self.key_for(model, size);
        self.inner.memory.remove(&key);
        self.inner.remove_from_disk(key).await;
    }

    /// Spawn a background task on the manager's runtime.
    ///
    /// Falls back to the ambient runtime, which panics when there is none.
    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match &self.inner.runtime {
            Some(runtime) => runtime.spawn(future),
            None => tokio::spawn(future),
        }
    }

    async fn fetch_coalesced(
        &self,
        key: CacheKey,
        request: FetchRequest,
        policy: CachePolicy,
    ) -> Result<DecodedImage> {
        let future = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight fetch");
                    existing.future.clone()
                }
                None => {
                    let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.spawn_fetch(key.clone(), id, request, policy);
                    in_flight.insert(
                        key.clone(),
                        InFlight {
                            id,
                            future: future.clone(),
                        },
                    );
                    debug!(key = %key, in_flight = in_flight.len(), "Started fetch");
                    future
                }
            }
        };

        future.await
    }

    fn spawn_fetch(
        &self,
        key: CacheKey,
        id: u64,
        request: FetchRequest,
        policy: CachePolicy,
    ) -> SharedFetch {
        let inner = self.inner.clone();
        let handle = self.spawn(async move {
            // Removes the in-flight entry however the task ends
            let _guard = InFlightGuard {
                inner: inner.clone(),
                key: key.clone(),
                id,
            };
            inner.fetch_and_store(&key, &request, policy).await
        });

        handle
            .map(|joined| joined.map_err(ImageCacheError::from).and_then(|result| result))
            .boxed()
            .shared()
    }
}

impl ManagerInner {
    async fn lookup(&self, key: &CacheKey, policy: CachePolicy) -> Option<DecodedImage> {
        if policy.read_memory {
            if let Some(image) = self.memory.get(key) {
                self.stats.on_memory_hit();
                debug!(key = %key, "Memory cache hit");
                return Some(image);
            }
            self.stats.on_memory_miss();
        }

        if policy.read_disk {
            match self.read_disk(key).await {
                Some(image) => {
                    self.stats.on_disk_hit();
                    debug!(key = %key, "Disk cache hit");
                    if policy.write_memory {
                        self.memory.put(key.clone(), image.clone());
                    }
                    return Some(image);
                }
                None => self.stats.on_disk_miss(),
            }
        }

        None
    }

    async fn read_disk(&self, key: &CacheKey) -> Option<DecodedImage> {
        let disk = self.disk.clone();
        let read_key = key.clone();
        let entry = match tokio::task::spawn_blocking(move || disk.get(&read_key)).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(key = %key, error = %e, "Disk read task failed");
                return None;
            }
        };

        match self.decode(entry.bytes).await {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable disk record");
                self.remove_from_disk(key.clone()).await;
                None
            }
        }
    }

    async fn fetch_and_store(
        &self,
        key: &CacheKey,
        request: &FetchRequest,
        policy: CachePolicy,
    ) -> Result<DecodedImage> {
        self.stats.on_network_fetch();
        let image = self.fetcher.fetch(request).await.map_err(|e| {
            warn!(key = %key, error = %e, "Image fetch failed");
            ImageCacheError::from(e)
        })?;
        self.stats.on_decode();

        if policy.write_disk {
            let bytes = self.encode(image.clone()).await?;
            let entry = DiskEntry {
                bytes,
                width: i32::try_from(image.width()).unwrap_or(i32::MAX),
                height: i32::try_from(image.height()).unwrap_or(i32::MAX),
            };
            let disk = self.disk.clone();
            let write_key = key.clone();
            if let Err(e) =
                tokio::task::spawn_blocking(move || disk.put(&write_key, &entry)).await
            {
                warn!(key = %key, error = %e, "Disk write task failed");
            }
        }

        if policy.write_memory {
            self.memory.put(key.clone(), image.clone());
        }

        debug!(
            key = %key,
            width = image.width(),
            height = image.height(),
            "Fetched image"
        );

        if self.config.log_stats {
            self.log_stats();
        }

        Ok(image)
    }

    async fn decode(&self, bytes: Bytes) -> Result<DecodedImage> {
        let _permit = self
            .codec_permits
            .acquire()
            .await
            .map_err(|e| ImageCacheError::Internal(e.to_string()))?;
        let codec = self.codec.clone();
        tokio::task::spawn_blocking(move || codec.decode(&bytes))
            .await?
            .map_err(|e| ImageCacheError::Decode(e.to_string()))
    }

    async fn encode(&self, image: DecodedImage) -> Result<Bytes> {
        let _permit = self
            .codec_permits
            .acquire()
            .await
            .map_err(|e| ImageCacheError::Internal(e.to_string()))?;
        let codec = self.codec.clone();
        tokio::task::spawn_blocking(move || codec.encode(&image))
            .await?
            .map_err(|e| ImageCacheError::Encode(e.to_string()))
    }

    async fn remove_from_disk(&self, key: CacheKey) {
        let disk = self.disk.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || disk.remove(&key)).await {
            warn!(error = %e, "Disk remove task failed");
        }
    }

    fn log_stats(&self) {
        let snapshot = self.stats.snapshot();
        debug!(
            memory_hit_rate = format!("{:.2}", snapshot.memory_hit_rate),
            disk_hit_rate = format!("{:.2}", snapshot.disk_hit_rate),
            network_fetches = snapshot.network_fetches,
            decode_count = snapshot.decode_count,
            "Image cache statistics"
        );
    }
}

struct InFlightGuard {
    inner: Arc<ManagerInner>,
    key: CacheKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight
            .get(&self.key)
            .is_some_and(|entry| entry.id == self.id)
        {
            in_flight.remove(&self.key);
        }
    }
}

/// Builder for [`ImageCacheManager`] with tiers sized from a [`CacheConfig`].
pub struct ImageCacheManagerBuilder {
    cache_root: PathBuf,
    fetcher: Arc<dyn ImageFetcher>,
    codec: Arc<dyn ImageCodec>,
    config: CacheConfig,
    clock: Option<Arc<dyn Clock>>,
    stats: Option<Arc<CacheStats>>,
    runtime: Option<Handle>,
}

impl ImageCacheManagerBuilder {
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for disk record ages (defaults to the system clock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share a statistics instance with other components.
    pub fn with_stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Runtime for fetch and preload tasks.
    ///
    /// Needed when the manager is built, or preloads are triggered, outside a
    /// Tokio runtime (for example from a UI thread).
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> ImageCacheManager {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let memory = Arc::new(MemoryCache::new(self.config.memory_cache_size_bytes()));
        let disk = Arc::new(DiskCache::new(
            self.cache_root.join(&self.config.disk_directory_name),
            self.config.disk_max_size_bytes,
            self.config.disk_ttl,
            clock,
        ));
        let stats = self.stats.unwrap_or_default();

        let runtime = self.runtime.or_else(|| Handle::try_current().ok());

        ImageCacheManager::with_parts(
            self.config,
            memory,
            disk,
            self.fetcher,
            self.codec,
            stats,
            runtime,
        )
    }
}
