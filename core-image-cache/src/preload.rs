//! Background warming of the cache tiers.

use crate::manager::ImageCacheManager;
use crate::model::ImageModel;
use crate::policy::CachePolicy;
use bridge_traits::image::TargetSize;
use parking_lot::Mutex;
use std::ops::Range;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Number of list items warmed ahead of the last visible one by default.
pub const DEFAULT_PRELOAD_NEXT: usize = 8;

impl ImageCacheManager {
    /// Warm the cache for `models` at their natural size.
    ///
    /// See [`preload_sized`](Self::preload_sized).
    pub fn preload(&self, models: Vec<ImageModel>) {
        self.preload_sized(models, None);
    }

    /// Warm the cache for `models`, one detached task per model.
    ///
    /// Returns immediately. Failures are dropped. Tasks run on the manager's
    /// runtime, so this may be called from threads outside it.
    pub fn preload_sized(&self, models: Vec<ImageModel>, size: Option<TargetSize>) {
        if models.is_empty() {
            return;
        }

        debug!(count = models.len(), "Preloading images");
        for model in models {
            let manager = self.clone();
            self.spawn(async move {
                if let Err(e) = manager.load(&model, size, CachePolicy::DEFAULT).await {
                    trace!(model = %model, error = %e, "Preload failed");
                }
            });
        }
    }

    /// Warm the cache for `models` one after another in a single task.
    ///
    /// The returned handle can be awaited for completion or aborted to stop
    /// the remaining loads.
    pub fn preload_sequential(
        &self,
        models: Vec<ImageModel>,
        size: Option<TargetSize>,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        self.spawn(async move {
            for model in models {
                if let Err(e) = manager.load(&model, size, CachePolicy::DEFAULT).await {
                    trace!(model = %model, error = %e, "Preload failed");
                }
            }
        })
    }
}

/// Index range to warm after a scroll position change.
///
/// `last_visible` is the highest visible item index, or `None` when nothing
/// is visible. Returns `None` when the range would be empty.
pub fn preload_window(
    last_visible: Option<usize>,
    item_count: usize,
    preload_next: usize,
) -> Option<Range<usize>> {
    let start = last_visible.map_or(0, |last| last.saturating_add(1));
    let end = start.saturating_add(preload_next).min(item_count);
    (start < end).then_some(start..end)
}

/// Warms the items just past the visible part of a scrolling list.
///
/// Feed it every scroll position change; it preloads each distinct window
/// once, so repeated notifications for the same position are free.
///
/// `on_scroll` is synchronous and may be called from a UI thread. The loads
/// run on the manager's runtime; a manager built outside any runtime needs
/// [`with_runtime`](crate::manager::ImageCacheManagerBuilder::with_runtime).
pub struct ListPreloader {
    manager: ImageCacheManager,
    preload_next: usize,
    size: Option<TargetSize>,
    last_window: Mutex<Option<Range<usize>>>,
}

impl ListPreloader {
    pub fn new(manager: ImageCacheManager) -> Self {
        Self {
            manager,
            preload_next: DEFAULT_PRELOAD_NEXT,
            size: None,
            last_window: Mutex::new(None),
        }
    }

    pub fn with_preload_next(mut self, count: usize) -> Self {
        self.preload_next = count;
        self
    }

    pub fn with_size(mut self, size: Option<TargetSize>) -> Self {
        self.size = size;
        self
    }

    /// Handle a scroll position over a fully materialized model list.
    ///
    /// Returns the window that was preloaded, if any.
    pub fn on_scroll(
        &self,
        last_visible: Option<usize>,
        models: &[ImageModel],
    ) -> Option<Range<usize>> {
        self.on_scroll_with(last_visible, models.len(), |index| models.get(index).cloned())
    }

    /// Handle a scroll position over a list whose models are looked up lazily.
    ///
    /// Items for which `model_at` returns `None` are skipped.
    pub fn on_scroll_with<F>(
        &self,
        last_visible: Option<usize>,
        item_count: usize,
        model_at: F,
    ) -> Option<Range<usize>>
    where
        F: Fn(usize) -> Option<ImageModel>,
    {
        let window = preload_window(last_visible, item_count, self.preload_next)?;

        {
            let mut last = self.last_window.lock();
            if last.as_ref() == Some(&window) {
                return None;
            }
            *last = Some(window.clone());
        }

        let models: Vec<ImageModel> = window.clone().filter_map(model_at).collect();
        self.manager.preload_sized(models, self.size);
        Some(window)
    }
}
