//! `src/cache/cache_manager.rs`
//! ============================================================================
//! # Directory Listing Cache
//!
//! An async cache of [`DirectoryEntry`] values keyed by
//! `(storage root slug, normalized directory path)`:
//! - Entries never expire on their own; they live until the root is
//!   invalidated (a user "refresh"). A configured `max_capacity` turns on
//!   size-based eviction
//! - Concurrent misses for the same key share one load
//! - Failed loads are never cached
//! - Hit/miss/load statistics for monitoring

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use moka::future::Cache;
use tracing::{debug, error, info, instrument, warn};

use crate::{config::CacheConfig, error::VfsError, fs::dir_entry::DirectoryEntry};

/// Cache key: one partition per storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub root: Arc<str>,
    pub path: Arc<str>,
}

impl ListingKey {
    pub fn new(root: &str, path: &str) -> Self {
        Self {
            root: Arc::from(root),
            path: Arc::from(path),
        }
    }
}

impl std::fmt::Display for ListingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.root, self.path)
    }
}

/// Cache statistics for monitoring and debugging
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_exceptions: AtomicU64,
    invalidations: AtomicU64,
    total_load_time_ns: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[expect(clippy::cast_possible_truncation, reason = "Expected accuracy")]
    pub fn record_load(&self, duration: Duration, success: bool) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);

        if !success {
            self.load_exceptions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let loads = self.loads.load(Ordering::Relaxed);
        let total_load_time_ns = self.total_load_time_ns.load(Ordering::Relaxed);

        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads,
            load_exceptions: self.load_exceptions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            average_load_penalty: if loads > 0 {
                Duration::from_nanos(total_load_time_ns / loads)
            } else {
                Duration::ZERO
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_exceptions: u64,
    pub invalidations: u64,
    pub average_load_penalty: Duration,
}

impl CacheStatsSnapshot {
    #[expect(clippy::cast_precision_loss, reason = "Expected precision loss")]
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared listing cache. Cloning is cheap and clones see the same entries.
#[derive(Clone)]
pub struct DirectoryCache {
    inner: Cache<ListingKey, DirectoryEntry>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl DirectoryCache {
    #[must_use]
    pub fn with_config(config: CacheConfig) -> Self {
        let mut builder = Cache::builder().support_invalidation_closures();
        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        let inner = builder.build();

        Self {
            inner,
            config,
            stats: Arc::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Cached listing, if present.
    #[instrument(skip(self), fields(cache_key = %key))]
    pub async fn get(&self, key: &ListingKey) -> Option<DirectoryEntry> {
        let result = self.inner.get(key).await;

        if self.config.enable_stats {
            if result.is_some() {
                self.stats.record_hit();
                debug!(
                    marker = "CACHE_OPERATION",
                    operation_type = "cache_hit",
                    cache_key = %key,
                    "Cache hit"
                );
            } else {
                self.stats.record_miss();
                debug!(
                    marker = "CACHE_OPERATION",
                    operation_type = "cache_miss",
                    cache_key = %key,
                    "Cache miss"
                );
            }
        }

        result
    }

    pub async fn insert(&self, key: ListingKey, entry: DirectoryEntry) {
        debug!(
            marker = "CACHE_OPERATION",
            operation_type = "cache_insert",
            cache_key = %key,
            dirs = entry.dirs.len(),
            files = entry.files.len(),
            "Inserted listing into cache"
        );
        self.inner.insert(key, entry).await;
    }

    /// Return the cached listing or run `loader` and cache its result.
    ///
    /// Concurrent callers for the same key wait on a single load. A failed
    /// load is returned to every waiter and nothing is cached.
    #[instrument(skip(self, loader), fields(cache_key = %key, operation_type = "cache_get_or_load"))]
    pub async fn get_or_load<F, Fut>(
        &self,
        key: ListingKey,
        loader: F,
    ) -> Result<DirectoryEntry, Arc<VfsError>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Result<DirectoryEntry, VfsError>> + Send,
    {
        if let Some(entry) = self.get(&key).await {
            return Ok(entry);
        }

        let load_start = Instant::now();
        let stats = self.stats.clone();
        let enable_stats = self.config.enable_stats;
        let key_clone = key.clone();

        self.inner
            .try_get_with(key, async move {
                let load_result = loader().await;
                let load_duration = load_start.elapsed();

                if enable_stats {
                    stats.record_load(load_duration, load_result.is_ok());
                }

                match &load_result {
                    Ok(entry) => info!(
                        marker = "CACHE_OPERATION",
                        operation_type = "loader_success",
                        cache_key = %key_clone,
                        load_duration_ms = load_duration.as_millis(),
                        dirs = entry.dirs.len(),
                        files = entry.files.len(),
                        "Listing loaded, caching result"
                    ),
                    Err(e) => error!(
                        marker = "CACHE_OPERATION",
                        operation_type = "loader_failure",
                        cache_key = %key_clone,
                        load_duration_ms = load_duration.as_millis(),
                        error = %e,
                        "Listing failed, not caching failure"
                    ),
                }

                load_result
            })
            .await
    }

    /// Drop every entry belonging to `root`. Other roots are untouched.
    pub fn invalidate_root(&self, root: &str) {
        let root: Arc<str> = Arc::from(root);
        let target = root.clone();

        match self
            .inner
            .invalidate_entries_if(move |k, _| k.root == target)
        {
            Ok(_) => {
                if self.config.enable_stats {
                    self.stats.record_invalidation();
                }
                info!(
                    marker = "CACHE_OPERATION",
                    operation_type = "cache_invalidate_root",
                    root = %root,
                    "Invalidated cached listings for root"
                );
            }
            Err(e) => {
                warn!(root = %root, error = %e, "Predicate invalidation rejected, clearing all");
                self.clear();
            }
        }
    }

    /// Clear all entries for every root.
    pub fn clear(&self) {
        self.inner.invalidate_all();
        info!("Directory cache cleared");
    }

    /// Approximate; moka applies pending work lazily.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DirectoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCache")
            .field("config", &self.config)
            .field("entry_count", &self.entry_count())
            .finish()
    }
}
