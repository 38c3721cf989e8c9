//! Integration tests for the image cache manager
//!
//! These tests drive the full load path (memory, disk, fetch) against a real
//! temporary directory and a scripted fetch capability.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::image::{DecodedImage, FetchRequest, ImageCodec, ImageFetcher, TargetSize};
use bytes::Bytes;
use core_image_cache::{
    CacheConfig, CacheImageModel, CachePolicy, DiskEntry, ImageCacheError, ImageCacheManager,
    ImageModel,
};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

const COVER_URL: &str = "https://example.com/cover.png";

mock! {
    pub Fetcher {}

    #[async_trait]
    impl ImageFetcher for Fetcher {
        async fn fetch(&self, request: &FetchRequest) -> BridgeResult<DecodedImage>;
    }
}

/// Stores raw pixels behind an 8-byte width/height prefix.
struct RawCodec;

impl ImageCodec for RawCodec {
    fn encode(&self, image: &DecodedImage) -> BridgeResult<Bytes> {
        let mut out = Vec::with_capacity(8 + image.byte_size());
        out.extend_from_slice(&image.width().to_be_bytes());
        out.extend_from_slice(&image.height().to_be_bytes());
        out.extend_from_slice(image.pixels());
        Ok(Bytes::from(out))
    }

    fn decode(&self, data: &[u8]) -> BridgeResult<DecodedImage> {
        if data.len() < 8 {
            return Err(BridgeError::Decode("truncated raw image".to_string()));
        }
        let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        Ok(DecodedImage::new(width, height, data[8..].to_vec()))
    }
}

/// Fetcher that blocks every fetch until the test opens the gate.
struct GatedFetcher {
    calls: AtomicUsize,
    gate: Semaphore,
    fail: bool,
}

impl GatedFetcher {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
            fail,
        })
    }

    fn open(&self) {
        self.gate.add_permits(1024);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for GatedFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> BridgeResult<DecodedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        if self.fail {
            Err(BridgeError::OperationFailed("HTTP 503".to_string()))
        } else {
            Ok(cover_image())
        }
    }
}

fn cover_image() -> DecodedImage {
    DecodedImage::solid(4, 3, [200, 10, 10, 255])
}

fn build_manager(dir: &TempDir, fetcher: Arc<dyn ImageFetcher>) -> ImageCacheManager {
    ImageCacheManager::builder(dir.path(), fetcher, Arc::new(RawCodec))
        .with_config(CacheConfig::new().with_cache_version("test-1"))
        .build()
}

fn fetcher_returning_cover(times: usize) -> MockFetcher {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .times(times)
        .returning(|_| Ok(cover_image()));
    fetcher
}

/// Wait until `count` loads have passed the disk lookup.
async fn wait_for_disk_misses(manager: &ImageCacheManager, count: u64) {
    for _ in 0..1_000 {
        if manager.stats_snapshot().disk_misses >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("loads never reached the fetch stage");
}

#[tokio::test]
async fn test_end_to_end_first_and_second_load() {
    let dir = TempDir::new().unwrap();
    let manager = build_manager(&dir, Arc::new(fetcher_returning_cover(1)));
    let model = ImageModel::from(COVER_URL);
    let key = manager.key_for(&model, None);

    let first = manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .unwrap();
    assert_eq!(first, cover_image());

    let stats = manager.stats_snapshot();
    assert_eq!(stats.memory_misses, 1);
    assert_eq!(stats.disk_misses, 1);
    assert_eq!(stats.network_fetches, 1);
    assert_eq!(stats.decode_count, 1);
    assert!(manager.memory_cache().contains(&key));
    assert!(manager.disk_cache().get(&key).is_some());

    let second = manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .unwrap();
    assert_eq!(second, first);

    let stats = manager.stats_snapshot();
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.network_fetches, 1);
    assert_eq!(stats.decode_count, 1);
    assert_eq!(stats.memory_hit_rate, 0.5);
}

#[tokio::test]
async fn test_disk_hit_repopulates_memory() {
    let dir = TempDir::new().unwrap();
    let manager = build_manager(&dir, Arc::new(fetcher_returning_cover(1)));
    let model = ImageModel::from(COVER_URL);

    manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .unwrap();
    manager.clear_memory();
    assert!(manager.memory_cache().is_empty());

    let image = manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .unwrap();
    assert_eq!(image, cover_image());

    let stats = manager.stats_snapshot();
    assert_eq!(stats.disk_hits, 1);
    assert_eq!(stats.network_fetches, 1);
    assert_eq!(manager.memory_cache().len(), 1);
}

#[tokio::test]
async fn test_disk_persists_across_managers() {
    let dir = TempDir::new().unwrap();
    let model = ImageModel::from(COVER_URL);

    let first = build_manager(&dir, Arc::new(fetcher_returning_cover(1)));
    first
        .load(&model, Some(TargetSize::new(4, 3)), CachePolicy::DEFAULT)
        .await
        .unwrap();

    let mut never = MockFetcher::new();
    never.expect_fetch().never();
    let second = build_manager(&dir, Arc::new(never));
    let image = second
        .load(&model, Some(TargetSize::new(4, 3)), CachePolicy::DEFAULT)
        .await
        .unwrap();

    assert_eq!(image, cover_image());
    assert_eq!(second.stats_snapshot().disk_hits, 1);
}

#[tokio::test]
async fn test_read_memory_disabled_skips_memory_tier() {
    let dir = TempDir::new().unwrap();
    let manager = build_manager(&dir, Arc::new(fetcher_returning_cover(1)));
    let model = ImageModel::from(COVER_URL);

    manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .unwrap();

    let policy = CachePolicy {
        read_memory: false,
        ..CachePolicy::DEFAULT
    };
    manager.load(&model, None, policy).await.unwrap();

    let stats = manager.stats_snapshot();
    assert_eq!(stats.memory_hits, 0);
    assert_eq!(stats.memory_misses, 1);
    assert_eq!(stats.disk_hits, 1);
}

#[tokio::test]
async fn test_write_disk_disabled_creates_no_record() {
    let dir = TempDir::new().unwrap();
    let manager = build_manager(&dir, Arc::new(fetcher_returning_cover(1)));
    let model = ImageModel::from(COVER_URL);

    manager
        .load(&model, None, CachePolicy::MEMORY_ONLY)
        .await
        .unwrap();

    assert_eq!(manager.disk_cache().entry_count(), 0);
    assert_eq!(manager.memory_cache().len(), 1);

    let stats = manager.stats_snapshot();
    assert_eq!(stats.disk_hits + stats.disk_misses, 0);
}

#[tokio::test]
async fn test_no_cache_policy_always_fetches() {
    let dir = TempDir::new().unwrap();
    let manager = build_manager(&dir, Arc::new(fetcher_returning_cover(2)));
    let model = ImageModel::from(COVER_URL);

    manager
        .load(&model, None, CachePolicy::NO_CACHE)
        .await
        .unwrap();
    manager
        .load(&model, None, CachePolicy::NO_CACHE)
        .await
        .unwrap();

    let stats = manager.stats_snapshot();
    assert_eq!(stats.network_fetches, 2);
    assert_eq!(stats.memory_hits + stats.memory_misses, 0);
    assert!(manager.memory_cache().is_empty());
    assert_eq!(manager.disk_cache().entry_count(), 0);
}

#[tokio::test]
async fn test_fetch_receives_headers_and_size() {
    let dir = TempDir::new().unwrap();
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|request| {
            request.headers.get("Referer").map(String::as_str) == Some("https://example.com/")
                && request.size == Some(TargetSize::new(120, 120))
        })
        .times(1)
        .returning(|_| Ok(cover_image()));
    let manager = build_manager(&dir, Arc::new(fetcher));

    let model: ImageModel = CacheImageModel::new(COVER_URL)
        .with_header("Referer", "https://example.com/")
        .with_key_tag("album")
        .into();
    manager
        .load(&model, Some(TargetSize::new(120, 120)), CachePolicy::DEFAULT)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fetch_failure_propagates_and_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .times(2)
        .returning(|_| Err(BridgeError::OperationFailed("HTTP 404".to_string())));
    let manager = build_manager(&dir, Arc::new(fetcher));
    let model = ImageModel::from(COVER_URL);

    let err = manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .unwrap_err();
    assert!(err.is_fetch_error());
    assert!(err.to_string().contains("HTTP 404"));
    assert_eq!(manager.in_flight_count(), 0);

    // A later load retries instead of replaying the failure
    assert!(manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .is_err());
    assert!(manager.memory_cache().is_empty());
    assert_eq!(manager.disk_cache().entry_count(), 0);
    assert_eq!(manager.stats_snapshot().decode_count, 0);
}

#[tokio::test]
async fn test_decode_failure_from_fetcher_is_decode_error() {
    let dir = TempDir::new().unwrap();
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .times(1)
        .returning(|_| Err(BridgeError::Decode("not an image".to_string())));
    let manager = build_manager(&dir, Arc::new(fetcher));

    let err = manager
        .load(&ImageModel::from(COVER_URL), None, CachePolicy::DEFAULT)
        .await
        .unwrap_err();
    assert_eq!(err, ImageCacheError::Decode("not an image".to_string()));
}

#[tokio::test]
async fn test_load_from_cache_never_fetches() {
    let dir = TempDir::new().unwrap();
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().never();
    let manager = build_manager(&dir, Arc::new(fetcher));
    let model = ImageModel::from(COVER_URL);

    assert!(manager
        .load_from_cache(&model, None, CachePolicy::DEFAULT)
        .await
        .is_none());

    let stats = manager.stats_snapshot();
    assert_eq!(stats.memory_misses, 1);
    assert_eq!(stats.disk_misses, 1);
    assert_eq!(stats.network_fetches, 0);

    manager
        .memory_cache()
        .put(manager.key_for(&model, None), cover_image());
    assert_eq!(
        manager
            .load_from_cache(&model, None, CachePolicy::DEFAULT)
            .await,
        Some(cover_image())
    );
}

#[tokio::test]
async fn test_undecodable_disk_record_falls_through_to_fetch() {
    let dir = TempDir::new().unwrap();
    let manager = build_manager(&dir, Arc::new(fetcher_returning_cover(1)));
    let model = ImageModel::from(COVER_URL);
    let key = manager.key_for(&model, None);

    manager.disk_cache().put(
        &key,
        &DiskEntry {
            bytes: Bytes::from_static(b"bad"),
            width: 4,
            height: 3,
        },
    );

    let image = manager
        .load(&model, None, CachePolicy::DEFAULT)
        .await
        .unwrap();
    assert_eq!(image, cover_image());

    let stats = manager.stats_snapshot();
    assert_eq!(stats.disk_hits, 0);
    assert_eq!(stats.disk_misses, 1);
    assert_eq!(stats.network_fetches, 1);

    // The fetched image replaced the corrupt record
    let entry = manager.disk_cache().get(&key).unwrap();
    assert_eq!(RawCodec.decode(&entry.bytes).unwrap(), cover_image());
}

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    const LOADS: usize = 8;

    let dir = TempDir::new().unwrap();
    let fetcher = GatedFetcher::new(false);
    let manager = build_manager(&dir, fetcher.clone());
    let model = ImageModel::from(COVER_URL);

    let handles: Vec<_> = (0..LOADS)
        .map(|_| {
            let manager = manager.clone();
            let model = model.clone();
            tokio::spawn(async move { manager.load(&model, None, CachePolicy::DEFAULT).await })
        })
        .collect();

    wait_for_disk_misses(&manager, LOADS as u64).await;
    assert_eq!(manager.in_flight_count(), 1);
    fetcher.open();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), cover_image());
    }

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(manager.stats_snapshot().network_fetches, 1);
    assert_eq!(manager.in_flight_count(), 0);
}

#[tokio::test]
async fn test_concurrent_loads_share_one_failure() {
    const LOADS: usize = 4;

    let dir = TempDir::new().unwrap();
    let fetcher = GatedFetcher::new(true);
    let manager = build_manager(&dir, fetcher.clone());
    let model = ImageModel::from(COVER_URL);

    let handles: Vec<_> = (0..LOADS)
        .map(|_| {
            let manager = manager.clone();
            let model = model.clone();
            tokio::spawn(async move { manager.load(&model, None, CachePolicy::DEFAULT).await })
        })
        .collect();

    wait_for_disk_misses(&manager, LOADS as u64).await;
    fetcher.open();

    let mut errors = Vec::new();
    for handle in handles {
        errors.push(handle.await.unwrap().unwrap_err());
    }

    assert_eq!(fetcher.calls(), 1);
    assert!(errors.iter().all(|e| e == &errors[0]));
    assert!(errors[0].is_fetch_error());
    assert_eq!(manager.in_flight_count(), 0);
}

#[tokio::test]
async fn test_cancelled_waiter_does_not_cancel_shared_fetch() {
    let dir = TempDir::new().unwrap();
    let fetcher = GatedFetcher::new(false);
    let manager = build_manager(&dir, fetcher.clone());
    let model = ImageModel::from(COVER_URL);

    let starter = {
        let manager = manager.clone();
        let model = model.clone();
        tokio::spawn(async move { manager.load(&model, None, CachePolicy::DEFAULT).await })
    };
    wait_for_disk_misses(&manager, 1).await;

    let waiter = {
        let manager = manager.clone();
        let model = model.clone();
        tokio::spawn(async move { manager.load(&model, None, CachePolicy::DEFAULT).await })
    };
    wait_for_disk_misses(&manager, 2).await;

    // The requester that started the fetch goes away
    starter.abort();
    assert!(starter.await.unwrap_err().is_cancelled());

    fetcher.open();
    assert_eq!(waiter.await.unwrap().unwrap(), cover_image());

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(manager.in_flight_count(), 0);
    assert_eq!(manager.memory_cache().len(), 1);
}

#[tokio::test]
async fn test_joined_fetch_writes_with_first_policy() {
    let dir = TempDir::new().unwrap();
    let fetcher = GatedFetcher::new(false);
    let manager = build_manager(&dir, fetcher.clone());
    let model = ImageModel::from(COVER_URL);

    let starter = {
        let manager = manager.clone();
        let model = model.clone();
        tokio::spawn(async move { manager.load(&model, None, CachePolicy::NO_CACHE).await })
    };
    for _ in 0..1_000 {
        if fetcher.calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fetcher.calls(), 1);

    let joiner = {
        let manager = manager.clone();
        let model = model.clone();
        tokio::spawn(async move { manager.load(&model, None, CachePolicy::DEFAULT).await })
    };
    wait_for_disk_misses(&manager, 1).await;
    fetcher.open();

    assert_eq!(starter.await.unwrap().unwrap(), cover_image());
    assert_eq!(joiner.await.unwrap().unwrap(), cover_image());

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(manager.memory_cache().len(), 0);
    assert_eq!(manager.disk_cache().entry_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_fetch_independently() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().returning(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(cover_image())
    });
    let manager = build_manager(&dir, Arc::new(fetcher));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let model = ImageModel::from(format!("https://example.com/{}.png", i));
                manager.load(&model, None, CachePolicy::DEFAULT).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(manager.memory_cache().len(), 6);
    assert_eq!(manager.disk_cache().entry_count(), 6);
    assert_eq!(manager.in_flight_count(), 0);
}

#[tokio::test]
async fn test_clear_disk_removes_records() {
    let dir = TempDir::new().unwrap();
    let manager = build_manager(&dir, Arc::new(fetcher_returning_cover(1)));

    manager
        .load(&ImageModel::from(COVER_URL), None, CachePolicy::DEFAULT)
        .await
        .unwrap();
    assert_eq!(manager.disk_cache().entry_count(), 1);

    manager.clear_disk().await;
    assert_eq!(manager.disk_cache().entry_count(), 0);
}
